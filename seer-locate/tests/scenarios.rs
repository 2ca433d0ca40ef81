//! End-to-end runs over synthetic scenes.

use glam::{DMat3, DVec3};
use seer_data::{PoseRecord, TriangleMesh, parse_frame_detections};
use seer_locate::pipeline::SkipReason;
use seer_locate::{
    BoxPolicy, CameraPose, Detection, FrameInput, FramePose, Intrinsics, LocateConfig,
    MeshIntersector, NormalizedBox, PoseTable, RayHit, localize_frame, run_batch,
};

const PILLOW_BOX: [[f64; 2]; 4] = [[0.2, 0.25], [0.45, 0.25], [0.45, 0.45], [0.2, 0.45]];

/// A square plane of half-size `half` at z = 2.
fn plane(half: f64) -> MeshIntersector {
    let mesh = TriangleMesh::new(
        vec![
            DVec3::new(-half, -half, 2.0),
            DVec3::new(half, -half, 2.0),
            DVec3::new(half, half, 2.0),
            DVec3::new(-half, half, 2.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    );
    MeshIntersector::build(&mesh).unwrap()
}

/// Camera at the origin looking down +Z at a 640x480 image.
fn frame_pose() -> FramePose {
    FramePose {
        pose: CameraPose::new(
            Intrinsics::new(500.0, 500.0, 320.0, 240.0),
            DMat3::IDENTITY,
            DVec3::ZERO,
        )
        .unwrap(),
        width: 640,
        height: 480,
    }
}

fn detection(name: &str, materials: &[&str], corners: [[f64; 2]; 4]) -> Detection {
    let (bbox, _) = NormalizedBox::from_corners(corners, BoxPolicy::Clamp).unwrap();
    Detection::new(name, materials, bbox)
}

fn poses(frames: &[&str]) -> PoseTable {
    let mut table = PoseTable::new();
    for frame in frames {
        table.insert(*frame, frame_pose());
    }
    table
}

#[test]
fn test_pillow_localizes_on_plane() {
    let intersector = plane(5.0);
    let fp = frame_pose();
    let localized = localize_frame(
        &fp.pose,
        fp.width,
        fp.height,
        &[detection("Pillow", &["cotton"], PILLOW_BOX)],
        &intersector,
    )
    .unwrap();

    assert_eq!(localized.len(), 1);
    assert_eq!(localized[0].hit_count(), 4);
    for hit in &localized[0].hits {
        let point = hit.point().unwrap();
        assert!((point.z - 2.0).abs() < 1e-9);
    }
    // (0.2, 0.25) → pixel (128, 120) → direction (-0.384, -0.24, 1).
    match localized[0].hits[0] {
        RayHit::Hit { point, distance, .. } => {
            assert!((point - DVec3::new(-0.768, -0.48, 2.0)).length() < 1e-9);
            assert!((distance - point.length()).abs() < 1e-9);
        }
        RayHit::Miss => panic!("top-left corner should hit"),
    }
}

#[test]
fn test_pillow_merges_across_frames() {
    let intersector = plane(5.0);
    let frames = vec![
        FrameInput::new("frame_001", vec![detection("Pillow", &["cotton"], PILLOW_BOX)]),
        FrameInput::new("frame_002", vec![detection("pillow", &["polyester"], PILLOW_BOX)]),
    ];
    let output = run_batch(
        &intersector,
        &poses(&["frame_001", "frame_002"]),
        &frames,
        &LocateConfig::default(),
    )
    .unwrap();

    assert_eq!(output.scene.objects.len(), 1);
    let pillow = &output.scene.objects[0];
    assert_eq!(pillow.name, "pillow");
    let materials: Vec<&str> = pillow.materials.iter().map(String::as_str).collect();
    assert_eq!(materials, vec!["cotton", "polyester"]);
    assert_eq!(pillow.frame_count(), 2);
    assert_eq!(pillow.observations, 2);
    assert!((pillow.anchor.z - 2.0).abs() < 1e-9);

    assert_eq!(output.report.frames_localized, 2);
    assert_eq!(output.report.corner_hits, 8);
    assert_eq!(output.report.corner_misses, 0);
    assert!(output.report.skipped_frames.is_empty());
}

#[test]
fn test_off_mesh_detection_is_unlocalized() {
    let intersector = plane(0.5);
    let frames = vec![FrameInput::new(
        "frame_001",
        vec![
            detection("lamp", &["brass"], [[0.0, 0.0], [0.1, 0.0], [0.1, 0.1], [0.0, 0.1]]),
            detection(
                "mug",
                &["ceramic"],
                [[0.45, 0.45], [0.55, 0.45], [0.55, 0.55], [0.45, 0.55]],
            ),
        ],
    )];
    let output = run_batch(
        &intersector,
        &poses(&["frame_001"]),
        &frames,
        &LocateConfig::default(),
    )
    .unwrap();

    assert_eq!(output.report.detections_localized, 1);
    assert_eq!(output.report.detections_unlocalized, 1);
    assert_eq!(output.report.corner_misses, 4);
    assert_eq!(output.scene.objects.len(), 1);
    assert_eq!(output.scene.objects[0].name, "mug");
    assert_eq!(output.scene.unlocalized.len(), 1);
    assert_eq!(output.scene.unlocalized[0].name, "lamp");
}

#[test]
fn test_missing_pose_frame_is_skipped() {
    let intersector = plane(5.0);
    let frames = vec![
        FrameInput::new("frame_001", vec![detection("chair", &["oak"], PILLOW_BOX)]),
        FrameInput::new("frame_002", vec![detection("table", &["pine"], PILLOW_BOX)]),
        FrameInput::new("frame_003", vec![detection("chair", &["leather"], PILLOW_BOX)]),
    ];
    let output = run_batch(
        &intersector,
        &poses(&["frame_001", "frame_003", "frame_004"]),
        &frames,
        &LocateConfig::default(),
    )
    .unwrap();

    let report = &output.report;
    assert_eq!(report.frames_total, 3);
    assert_eq!(report.frames_localized, 2);
    assert_eq!(report.skipped_frames.len(), 1);
    assert_eq!(report.skipped_frames[0].frame, "frame_002");
    assert_eq!(report.skipped_frames[0].reason, SkipReason::MissingPose);
    assert_eq!(report.detections_skipped, 1);
    assert_eq!(report.poses_without_detections, 1);

    assert_eq!(output.scene.objects.len(), 1);
    let chair = &output.scene.objects[0];
    assert_eq!(chair.name, "chair");
    assert_eq!(chair.frame_count(), 2);
    assert_eq!(chair.materials.len(), 2);
}

#[test]
fn test_degenerate_pose_is_isolated() {
    let intersector = plane(5.0);
    let good = PoseRecord {
        image_name: "good.jpg".into(),
        width: 640,
        height: 480,
        fx: 500.0,
        fy: 500.0,
        cx: 320.0,
        cy: 240.0,
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };
    let bad = PoseRecord {
        image_name: "bad.jpg".into(),
        rotation: DMat3::from_diagonal(DVec3::new(1.0, 2.0, 1.0)),
        ..good.clone()
    };
    let frames = vec![
        FrameInput::new("good", vec![detection("plant", &["leaf"], PILLOW_BOX)]),
        FrameInput::new("bad", vec![detection("plant", &["pot"], PILLOW_BOX)]),
    ];
    let output = run_batch(
        &intersector,
        &PoseTable::from_records([good, bad]),
        &frames,
        &LocateConfig::default(),
    )
    .unwrap();

    assert_eq!(output.report.skipped_frames.len(), 1);
    assert_eq!(output.report.skipped_frames[0].frame, "bad");
    assert_eq!(output.report.skipped_frames[0].reason, SkipReason::DegenerateCamera);
    assert_eq!(output.report.poses_without_detections, 0);
    assert_eq!(output.scene.objects.len(), 1);
    assert_eq!(output.scene.objects[0].materials.len(), 1);
}

#[test]
fn test_different_names_never_merge_in_batch() {
    let intersector = plane(5.0);
    let frames = vec![FrameInput::new(
        "frame_001",
        vec![
            detection("bed", &["wood"], PILLOW_BOX),
            detection("Bed  Frame", &["metal"], PILLOW_BOX),
        ],
    )];
    let output = run_batch(
        &intersector,
        &poses(&["frame_001"]),
        &frames,
        &LocateConfig::default(),
    )
    .unwrap();

    let names: Vec<&str> = output.scene.objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["bed", "bed frame"]);
}

#[test]
fn test_sequential_and_parallel_runs_agree() {
    let intersector = plane(5.0);
    let frames: Vec<FrameInput> = (0..8)
        .map(|i| {
            let x = 0.1 * i as f64;
            FrameInput::new(
                format!("frame_{:03}", 7 - i),
                vec![
                    detection(
                        "book",
                        &["paper"],
                        [[x, 0.1], [x + 0.05, 0.1], [x + 0.05, 0.2], [x, 0.2]],
                    ),
                    detection("shelf", &["pine"], PILLOW_BOX),
                ],
            )
        })
        .collect();
    let names: Vec<String> = frames.iter().map(|f| f.frame.clone()).collect();
    let table = poses(&names.iter().map(String::as_str).collect::<Vec<_>>());

    let parallel = run_batch(&intersector, &table, &frames, &LocateConfig::default()).unwrap();
    let sequential = run_batch(
        &intersector,
        &table,
        &frames,
        &LocateConfig {
            parallel: false,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(parallel, sequential);
}

#[test]
fn test_detector_json_to_scene() {
    let intersector = plane(5.0);
    let reply = r#"```json
{
  "throw_pillow": {"name": "Throw Pillow", "materials": ["Cotton"],
                   "box": [[0.2, 0.25], [0.45, 0.25], [0.45, 0.45], [0.2, 0.45]]},
  "throw_pillow": {"materials": ["linen"], "box": [0.2, 0.25, 0.45, 0.45]},
  "ghost": {"name": "ghost", "box": [[0.1, 0.1]]}
}
```"#;
    let parsed = parse_frame_detections("frame_001", reply).unwrap();
    let input = FrameInput::from_records(&parsed, BoxPolicy::Clamp);
    assert_eq!(input.detections.len(), 2);
    assert_eq!(input.rejected, 1);

    let output = run_batch(
        &intersector,
        &poses(&["frame_001"]),
        &[input],
        &LocateConfig::default(),
    )
    .unwrap();
    assert_eq!(output.report.rejected_records, 1);
    assert_eq!(output.scene.objects.len(), 1);
    let pillow = &output.scene.objects[0];
    assert_eq!(pillow.name, "throw pillow");
    assert_eq!(pillow.observations, 2);
    assert!(pillow.materials.contains("cotton") && pillow.materials.contains("linen"));
}
