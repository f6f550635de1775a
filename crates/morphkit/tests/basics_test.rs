//! End-to-end tests for morphkit.
//!
//! Target files are written to temporary directories and loaded through a
//! session, the same way an application would.

use std::path::Path;

use approx::assert_relative_eq;
use morphkit::*;
use proptest::prelude::*;

/// A unit quad split across groups `front` and `back` by a duplicate face.
fn quad_source() -> MeshSource {
    MeshSource {
        arity: Some(4),
        positions: vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        faces: vec![
            FaceSpec {
                vertices: vec![0, 1, 2, 3],
                group: "front".into(),
                uv: None,
            },
            FaceSpec {
                vertices: vec![0, 3, 2, 1],
                group: "back".into(),
                uv: None,
            },
        ],
    }
}

fn session_in(dir: &Path) -> Session {
    let mut options = Options::default();
    options.target.root = Some(dir.to_path_buf());
    Session::new(options)
}

fn write_target(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).unwrap();
}

fn assert_vec3_eq(a: Vec3, b: Vec3) {
    assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
    assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
    assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
}

#[test]
fn test_quad_arity() {
    let mut mesh = Mesh::new("quad", 4);
    for p in quad_source().positions {
        mesh.create_vertex(p);
    }
    let group = mesh.create_face_group("body").unwrap();
    assert!(mesh.create_face(group, &[0, 1, 2, 3], None).is_ok());
    assert!(matches!(
        mesh.create_face(group, &[0, 1, 2], None),
        Err(MorphError::ArityMismatch {
            expected: 4,
            actual: 3
        })
    ));
}

#[test]
fn test_apply_target_file_at_half() {
    let dir = tempfile::tempdir().unwrap();
    write_target(dir.path(), "b.target", "0 1.0 0.0 0.0\n2 0.0 2.0 0.0\n");
    let session = session_in(dir.path());
    let mut mesh = session.build_mesh("quad", &quad_source()).unwrap();

    assert!(session
        .apply(&mut mesh, "b.target", 0.5, &ApplyOptions::default())
        .unwrap());
    assert_eq!(mesh.position(0), Some(Vec3::new(0.5, 0.0, 0.0)));
    assert_eq!(mesh.position(1), Some(Vec3::new(1.0, 0.0, 0.0)));
    assert_eq!(mesh.position(2), Some(Vec3::new(1.0, 2.0, 0.0)));
}

#[test]
fn test_out_of_range_line_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_target(dir.path(), "c.target", "1 0 0 1\n99 5 5 5\n");
    let session = session_in(dir.path());
    let mesh = session.build_mesh("quad", &quad_source()).unwrap();
    let target = session.target(&mesh, "c.target").unwrap();
    assert_eq!(target.vertices(), &[1]);
}

#[test]
fn test_identity_warp_everywhere() {
    let landmarks = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 1.0)];
    let field = WarpField::fit(&landmarks, &landmarks, &WarpOptions::default()).unwrap();
    for (warped, p) in field.warp_points(&landmarks).into_iter().zip(landmarks) {
        assert_vec3_eq(warped, p);
    }
    let elsewhere = [
        Vec3::new(1.0, 1.0, 0.5),
        Vec3::new(0.0, 0.0, 4.0),
        Vec3::new(-5.0, 2.0, -1.0),
    ];
    for (warped, p) in field.warp_points(&elsewhere).into_iter().zip(elsewhere) {
        assert_vec3_eq(warped, p);
    }
}

#[test]
fn test_warp_target_onto_identical_mesh() {
    let dir = tempfile::tempdir().unwrap();
    write_target(dir.path(), "bulge.target", "2 0.1 0.2 0.3
");
    let session = session_in(dir.path());
    let source = session.build_mesh("a", &quad_source()).unwrap();
    let destination = session.build_mesh("b", &quad_source()).unwrap();

    // vertex 2 is not a landmark
    let warped = session
        .warp_target(&source, "bulge.target", &destination, "bulge.b", &[0, 1, 3])
        .unwrap();
    assert_vec3_eq(warped.delta(2).unwrap(), Vec3::new(0.1, 0.2, 0.3));
}

#[test]
fn test_warp_target_between_meshes() {
    let dir = tempfile::tempdir().unwrap();
    // Slide vertex 0 onto vertex 1
    write_target(dir.path(), "slide.target", "0 1 0 0\n");
    let session = session_in(dir.path());
    let source = session.build_mesh("small", &quad_source()).unwrap();

    let mut big = quad_source();
    for p in &mut big.positions {
        *p *= 2.0;
    }
    let mut destination = session.build_mesh("big", &big).unwrap();

    let warped = session
        .warp_target(&source, "slide.target", &destination, "slide.big", &[0, 1, 2, 3])
        .unwrap();
    assert_eq!(warped.origin(), TargetOrigin::Registered);
    assert_vec3_eq(warped.delta(0).unwrap(), Vec3::new(2.0, 0.0, 0.0));

    session
        .apply(&mut destination, "slide.big", 1.0, &ApplyOptions::default())
        .unwrap();
    assert_vec3_eq(destination.position(0).unwrap(), Vec3::new(2.0, 0.0, 0.0));
    assert!(session.cache().contains("slide.big"));
}

#[test]
fn test_character_bookkeeping() {
    let dir = tempfile::tempdir().unwrap();
    write_target(dir.path(), "lift.target", "2 0 0 1\n");
    let session = session_in(dir.path());
    let mesh = session.build_mesh("quad", &quad_source()).unwrap();
    let mut character = Character::new(mesh);

    assert!(character.set_target(&session, "lift.target", 0.8).unwrap());
    assert!(character.set_target(&session, "lift.target", 0.3).unwrap());
    assert!(!character.set_target(&session, "lift.target", 0.3).unwrap());
    assert_relative_eq!(character.target_value("lift.target"), 0.3);
    assert_vec3_eq(character.mesh().position(2).unwrap(), Vec3::new(1.0, 1.0, 0.3));
    assert_eq!(character.applied_targets().count(), 1);

    character.set_target(&session, "lift.target", 0.0).unwrap();
    assert_eq!(character.applied_targets().count(), 0);
    assert_vec3_eq(character.mesh().position(2).unwrap(), Vec3::new(1.0, 1.0, 0.0));

    character.set_target(&session, "lift.target", 2.0).unwrap();
    character.reset_targets();
    assert_eq!(character.target_value("lift.target"), 0.0);
    assert_eq!(character.mesh().position(2), Some(Vec3::new(1.0, 1.0, 0.0)));
}

#[test]
fn test_missing_target_keeps_value() {
    let dir = tempfile::tempdir().unwrap();
    let session = session_in(dir.path());
    let mesh = session.build_mesh("quad", &quad_source()).unwrap();
    let mut character = Character::new(mesh);
    let err = character
        .set_target(&session, "absent.target", 1.0)
        .unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(character.target_value("absent.target"), 0.0);
}

#[test]
fn test_fallback_policy_retries() {
    let dir = tempfile::tempdir().unwrap();
    write_target(dir.path(), "caucasian-female.target", "3 0 0 2\n");
    let mut options = Options::default();
    options.target.root = Some(dir.path().to_path_buf());
    options.fallback.substitutions = vec![
        ("african".to_string(), "caucasian".to_string()),
        ("asian".to_string(), "caucasian".to_string()),
    ];
    let session = Session::new(options);
    let mut mesh = session.build_mesh("quad", &quad_source()).unwrap();

    session
        .apply(&mut mesh, "asian-female.target", 0.5, &ApplyOptions::default())
        .unwrap();
    assert_eq!(mesh.position(3), Some(Vec3::new(0.0, 1.0, 1.0)));
    assert!(session.cache().contains("caucasian-female.target"));
    assert!(!session.cache().contains("asian-female.target"));

    let err = session
        .apply(&mut mesh, "asian-male.target", 1.0, &ApplyOptions::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "morph target 'asian-male.target' not found");
}

#[test]
fn test_render_buffer_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    write_target(dir.path(), "push.target", "0 0 0 1\n");
    let session = session_in(dir.path());
    let mut mesh = session.build_mesh("quad", &quad_source()).unwrap();
    mesh.attach(Box::new(RenderBuffer::new()));

    {
        let buffer = mesh.sink::<RenderBuffer>().unwrap();
        // Every vertex is used by both groups
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.indices().len(), 8);
    }
    mesh.sink_mut::<RenderBuffer>().unwrap().take_dirty();

    session
        .apply(&mut mesh, "push.target", 1.0, &ApplyOptions::default())
        .unwrap();
    let buffer = mesh.sink::<RenderBuffer>().unwrap();
    let slots = buffer.layout().slots(0).to_vec();
    assert_eq!(slots.len(), 2);
    for slot in slots {
        assert_eq!(buffer.slot(slot as usize).unwrap().position, [0.0, 0.0, 1.0]);
    }
    assert_eq!(buffer.stats().vertex_pushes, 4 + 1);
}

#[test]
fn test_hidden_group_has_no_slots() {
    let session = Session::default();
    let mut source = quad_source();
    source.faces[1].group = "tongue-helper".into();
    let mut mesh = session.build_mesh("quad", &source).unwrap();
    mesh.attach(Box::new(RenderBuffer::new()));
    assert_eq!(mesh.sink::<RenderBuffer>().unwrap().len(), 4);
}

#[test]
fn test_shadow_buffer_receives_deltas() {
    let dir = tempfile::tempdir().unwrap();
    write_target(dir.path(), "s.target", "1 0 1 0\n");
    let session = session_in(dir.path());
    let mut mesh = session.build_mesh("quad", &quad_source()).unwrap();
    let shadow = ShadowBuffer::new(mesh.positions());
    mesh.add_listener(Box::new(shadow));

    session
        .apply(&mut mesh, "s.target", 0.25, &ApplyOptions::default())
        .unwrap();
    let shadow = mesh.listener::<ShadowBuffer>().unwrap();
    assert_eq!(shadow.positions()[1], Vec3::new(1.0, 0.25, 0.0));
    assert_eq!(shadow.positions()[0], Vec3::ZERO);
}

#[test]
fn test_session_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("morphkit.json");
    std::fs::write(
        &config,
        r#"{ "mesh": { "default_arity": 3 }, "target": { "save_epsilon": 0.01 } }"#,
    )
    .unwrap();
    let session = Session::from_config_file(&config).unwrap();
    assert_eq!(session.options().mesh.default_arity, 3);
    assert_eq!(session.empty_mesh("m").arity(), 3);
    assert_relative_eq!(session.store().options().save_epsilon, 0.01);

    assert!(matches!(
        Session::from_config_file(dir.path().join("missing.json")),
        Err(MorphError::IoError(_))
    ));
}

#[test]
fn test_sculpt_save_reload() {
    let dir = tempfile::tempdir().unwrap();
    let session = session_in(dir.path());
    let mut mesh = session.build_mesh("quad", &quad_source()).unwrap();
    mesh.set_vertex_position(2, Vec3::new(1.5, 1.0, 0.25)).unwrap();

    let path = dir.path().join("sculpt.target");
    assert_eq!(session.store().save_target(&mesh, &path, None).unwrap(), 1);

    let mut fresh = session.build_mesh("quad", &quad_source()).unwrap();
    session
        .apply(&mut fresh, "sculpt.target", 1.0, &ApplyOptions::default())
        .unwrap();
    assert_vec3_eq(fresh.position(2).unwrap(), Vec3::new(1.5, 1.0, 0.25));
}

proptest! {
    #[test]
    fn prop_face_arity_enforced(arity in 3usize..=4, count in 1usize..=6) {
        let mut mesh = Mesh::new("m", arity);
        for i in 0..6 {
            mesh.create_vertex(Vec3::new(i as f32, (i * i) as f32, 0.0));
        }
        let group = mesh.create_face_group("g").unwrap();
        let vertices: Vec<usize> = (0..count).collect();
        let result = mesh.create_face(group, &vertices, None);
        if count == arity {
            prop_assert!(result.is_ok());
            prop_assert_eq!(mesh.face_count(), 1);
        } else {
            let is_mismatch = matches!(result, Err(MorphError::ArityMismatch { .. }));
            prop_assert!(is_mismatch);
            prop_assert_eq!(mesh.face_count(), 0);
        }
    }
}
