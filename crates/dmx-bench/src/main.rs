//! Benchmark for DMX serialization using a synthetic scene.
//!
//! Builds a scene of animated meshes and times encoding, eager decoding and
//! deferred decoding for every built-in codec target.
//!
//! Usage: `bench-scene [mesh-count]`

use std::time::{Duration, Instant};

use dmx::{
    Color, Document, ElementArray, LoadOptions, Matrix, Quaternion, Time, Vector2, Vector3,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_MESHES: usize = 2_000;
const VERTICES_PER_MESH: usize = 64;
const DECODE_ITERS: u32 = 5;

/// Builds a scene with one shared material per 16 meshes, a joint chain and
/// per-mesh vertex streams.
fn build_scene(meshes: usize) -> Document {
    let doc = Document::new();
    doc.set_format("model", 18);
    let root = doc
        .build("scene")
        .class_name("DmeModelRoot")
        .attr("frameRate", 30i32)
        .attr("duration", Time::from_secs_f64(12.5))
        .finish()
        .expect("Failed to build root");

    let materials: Vec<_> = (0..meshes.div_ceil(16))
        .map(|i| {
            doc.build(format!("material_{i}"))
                .class_name("DmeMaterial")
                .attr("mtlName", format!("materials/scene/surface_{i:03}.vmt"))
                .attr("tint", Color::new((i % 256) as u8, 128, 64, 255))
                .finish()
                .expect("Failed to build material")
        })
        .collect();

    let joints = ElementArray::new(&doc);
    let mut parent = None;
    for j in 0..32 {
        let joint = doc
            .build(format!("joint_{j}"))
            .class_name("DmeJoint")
            .attr("position", Vector3::new(0.0, j as f32 * 0.1, 0.0))
            .attr("orientation", Quaternion::IDENTITY)
            .attr("transform", Matrix::IDENTITY)
            .finish()
            .expect("Failed to build joint");
        if let Some(parent) = &parent {
            joint.set_element("parent", Some(parent)).expect("Failed to link joint");
        }
        joints.push(&joint).expect("Failed to add joint");
        parent = Some(joint);
    }
    root.set("joints", joints).expect("Failed to set joints");

    let children = ElementArray::new(&doc);
    for m in 0..meshes {
        let positions: Vec<Vector3> = (0..VERTICES_PER_MESH)
            .map(|v| Vector3::new(m as f32, v as f32, (m * v) as f32 * 0.01))
            .collect();
        let uvs: Vec<Vector2> = (0..VERTICES_PER_MESH)
            .map(|v| Vector2::new(v as f32 / VERTICES_PER_MESH as f32, 0.5))
            .collect();
        let indices: Vec<i32> = (0..VERTICES_PER_MESH as i32 * 3).map(|i| i % VERTICES_PER_MESH as i32).collect();
        let mesh = doc
            .build(format!("mesh_{m}"))
            .class_name("DmeMesh")
            .attr("positions", positions)
            .attr("textureCoordinates", uvs)
            .attr("indices", indices)
            .attr("visible", m % 7 != 0)
            .element("material", &materials[m / 16])
            .finish()
            .expect("Failed to build mesh");
        children.push(&mesh).expect("Failed to add mesh");
    }
    root.set("children", children).expect("Failed to set children");
    doc
}

fn throughput(bytes: usize, elapsed: Duration) -> f64 {
    (bytes as f64 / 1_000_000.0) / elapsed.as_secs_f64()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let meshes = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_MESHES);

    let build_start = Instant::now();
    let doc = build_scene(meshes);
    let build_time = build_start.elapsed();
    info!(elements = doc.len(), ?build_time, "built scene");

    println!("Scene: {} meshes, {} elements, built in {:?}", meshes, doc.len(), build_time);

    let registry = dmx::global_registry();
    for (encoding, version) in registry.targets() {
        println!("\n=== {} {} ===", encoding, version);

        let encode_start = Instant::now();
        let encoded = match registry.save(&doc, encoding, version) {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("  skipped: {}", e);
                continue;
            }
        };
        let encode_time = encode_start.elapsed();
        println!("  Encode: {} bytes in {:?}", encoded.len(), encode_time);
        println!("    Throughput: {:.2} MB/s", throughput(encoded.len(), encode_time));

        // Warmup
        let _ = dmx::load(&encoded).expect("Failed to decode");

        let eager_start = Instant::now();
        let mut decoded = None;
        for _ in 0..DECODE_ITERS {
            decoded = Some(dmx::load(&encoded).expect("Failed to decode"));
        }
        let eager_time = eager_start.elapsed() / DECODE_ITERS;
        println!("  Decode (eager): {:?} (avg of {} iterations)", eager_time, DECODE_ITERS);
        println!("    Throughput: {:.2} MB/s", throughput(encoded.len(), eager_time));
        if let Some(decoded) = decoded {
            assert_eq!(decoded.len(), doc.len());
        }

        let options = LoadOptions::deferred();
        let deferred_start = Instant::now();
        let mut lazy = None;
        for _ in 0..DECODE_ITERS {
            lazy = Some(dmx::load_with(&encoded, &options).expect("Failed to decode deferred"));
        }
        let deferred_time = deferred_start.elapsed() / DECODE_ITERS;
        println!("  Decode (deferred): {:?} (avg of {} iterations)", deferred_time, DECODE_ITERS);

        if let Some(lazy) = lazy.filter(|d| d.has_deferred_source()) {
            let resolve_start = Instant::now();
            lazy.resolve_all().expect("Failed to resolve deferred values");
            let resolve_time = resolve_start.elapsed();
            println!("  Resolve all: {:?}", resolve_time);
            println!(
                "    Deferred load + resolve vs eager: {:.2}x",
                (deferred_time + resolve_time).as_secs_f64() / eager_time.as_secs_f64()
            );
        }
    }
}
