use glam::{Mat4, Vec3};
use zyg_core::light::{EnvironmentImage, HostLight, LightKind, World};
use zyg_core::material::{
    BlendMethod, HostMaterial, MaterialId, PrincipledBsdf, ShaderGraph, ShaderNode,
};
use zyg_core::mesh::{HostMesh, Loop, LoopTriangle};
use zyg_core::mock::{Call, MockRenderer};
use zyg_core::scene::{HostCamera, Instance, MeshObject, ObjectData, ObjectId, SceneObject};
use zyg_core::{
    BridgeError, Primitive, RendererError, SceneSnapshot, Session, SessionConfig, SessionState,
    Shape, Transform, Visibility,
};

const CUBE: ObjectId = ObjectId(1);
const LAMP: ObjectId = ObjectId(2);
const CAMERA: ObjectId = ObjectId(3);
const SUN: ObjectId = ObjectId(4);
const PAINT: MaterialId = MaterialId(10);
const GHOST: MaterialId = MaterialId(11);

fn triangle_mesh() -> HostMesh {
    let n = [0.0, 0.0, 1.0];
    HostMesh {
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        loops: vec![
            Loop { vertex: 0, normal: n, uv: None, tangent: None },
            Loop { vertex: 1, normal: n, uv: None, tangent: None },
            Loop { vertex: 2, normal: n, uv: None, tangent: None },
        ],
        triangles: vec![LoopTriangle { loops: [0, 1, 2], material_index: 0 }],
    }
}

fn paint(alpha: f32, blend_method: BlendMethod) -> HostMaterial {
    HostMaterial {
        id: PAINT,
        name: "Paint".into(),
        blend_method,
        node_tree: Some(ShaderGraph {
            nodes: vec![ShaderNode::PrincipledBsdf(PrincipledBsdf {
                alpha: Some(alpha),
                ..PrincipledBsdf::default()
            })],
        }),
    }
}

fn mesh_object(id: ObjectId, slots: Vec<Option<MaterialId>>) -> SceneObject {
    SceneObject {
        id,
        name: format!("mesh-{}", id.0),
        data: ObjectData::Mesh(MeshObject {
            mesh: triangle_mesh(),
            material_slots: slots,
        }),
    }
}

/// A cube instanced `copies` times, plus a camera.
fn instanced_scene(copies: usize) -> SceneSnapshot {
    let mut scene = SceneSnapshot::default();
    scene.render.resolution_x = 8;
    scene.render.resolution_y = 4;
    scene.materials.insert(PAINT, paint(1.0, BlendMethod::Opaque));
    scene.objects.insert(CUBE, mesh_object(CUBE, vec![Some(PAINT)]));
    for i in 0..copies {
        scene.instances.push(Instance {
            is_instance: i > 0,
            ..Instance::new(CUBE, Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)))
        });
    }
    scene.add_object(
        SceneObject {
            id: CAMERA,
            name: "Camera".into(),
            data: ObjectData::Camera(HostCamera { fov: 0.8 }),
        },
        Mat4::from_translation(Vec3::new(0.0, -5.0, 1.0)),
    );
    scene.active_camera = Some(CAMERA);
    scene
}

fn created_session() -> Session<MockRenderer> {
    let mut session = Session::new(MockRenderer::new(), SessionConfig::default());
    session.create().unwrap();
    session
}

#[test]
fn instanced_mesh_is_uploaded_once() {
    let mut session = created_session();
    let stats = session.reset(&instanced_scene(5)).unwrap().unwrap();

    let renderer = session.renderer();
    assert_eq!(renderer.mesh_uploads(), 1);
    assert_eq!(renderer.material_creations(), 1);
    assert_eq!(session.materials().synthesis_count(), 1);
    assert_eq!(renderer.props(), 5);
    assert_eq!(stats.mesh_props, 5);
    assert_eq!(stats.instanced_props, 4);
    assert_eq!(stats.meshes_uploaded, 1);

    // One distinct transform per instance, then the camera.
    let transforms = renderer.transforms();
    assert_eq!(transforms.len(), 6);
    let translations: Vec<_> = transforms[..5].iter().map(|(_, t)| t.translation()[0]).collect();
    assert_eq!(translations, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn reset_rebuilds_from_empty_cache() {
    let mut session = created_session();
    let scene = instanced_scene(2);
    session.reset(&scene).unwrap();
    session.reset(&scene).unwrap();
    assert_eq!(session.renderer().mesh_uploads(), 2);
    assert_eq!(session.cache().build_count(), 1);
}

#[test]
fn second_reset_restarts_renderer() {
    let mut session = created_session();
    let scene = instanced_scene(1);
    session.reset(&scene).unwrap();
    assert_eq!(session.renderer().count(|c| *c == Call::Release), 0);
    session.reset(&scene).unwrap();
    let calls = &session.renderer().calls;
    let release = calls.iter().position(|c| *c == Call::Release).unwrap();
    assert_eq!(calls[release + 1], Call::Init);
    assert_eq!(session.renderer().count(|c| *c == Call::Init), 2);
    assert_eq!(session.state(), SessionState::Created);
}

#[test]
fn failed_restart_releases_session() {
    let mut session = created_session();
    let scene = instanced_scene(1);
    session.reset(&scene).unwrap();

    session.renderer_mut().fail_on = Some("su_init");
    let err = session.reset(&scene).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Renderer(RendererError::Call { call: "su_init", .. })
    ));
    assert_eq!(session.state(), SessionState::Released);

    session.renderer_mut().fail_on = None;
    let calls_before = session.renderer().calls.len();
    assert!(session.reset(&scene).unwrap().is_none());
    assert!(session.render().unwrap().is_none());
    session.release().unwrap();
    assert_eq!(session.renderer().calls.len(), calls_before);
    assert_eq!(session.renderer().count(|c| *c == Call::Release), 1);
}

#[test]
fn camera_uses_camera_convention_and_fov() {
    let mut session = created_session();
    session.reset(&instanced_scene(1)).unwrap();
    let renderer = session.renderer();
    let camera = Transform::camera(&Mat4::from_translation(Vec3::new(0.0, -5.0, 1.0)));
    assert!(renderer
        .calls
        .iter()
        .any(|c| matches!(c, Call::SetTransformation(_, t) if *t == camera)));
    assert!(renderer.calls.contains(&Call::CameraSetFov(0.8)));
    assert!(renderer
        .calls
        .contains(&Call::CreatePerspectiveCamera { width: 8, height: 4 }));
}

#[test]
fn invisible_material_skips_mesh() {
    let mut session = created_session();
    let mut scene = instanced_scene(3);
    scene.materials.insert(PAINT, paint(0.0, BlendMethod::Blend));
    let stats = session.reset(&scene).unwrap().unwrap();
    assert_eq!(session.renderer().mesh_uploads(), 0);
    assert_eq!(session.renderer().props(), 0);
    assert_eq!(stats.skipped, 3);

    scene.materials.insert(PAINT, paint(0.01, BlendMethod::Blend));
    session.reset(&scene).unwrap();
    assert_eq!(session.renderer().mesh_uploads(), 1);
}

#[test]
fn one_invisible_slot_skips_whole_mesh() {
    let mut session = created_session();
    let mut scene = instanced_scene(0);
    let mut ghost = paint(0.0, BlendMethod::Blend);
    ghost.id = GHOST;
    scene.materials.insert(GHOST, ghost);
    scene.materials.insert(PAINT, paint(1.0, BlendMethod::Opaque));

    let mut object = mesh_object(ObjectId(9), vec![Some(GHOST), Some(PAINT)]);
    if let ObjectData::Mesh(mesh) = &mut object.data {
        mesh.mesh.triangles.push(LoopTriangle { loops: [0, 1, 2], material_index: 1 });
    }
    scene.add_object(object, Mat4::IDENTITY);

    let stats = session.reset(&scene).unwrap().unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.mesh_props, 0);
    assert_eq!(session.renderer().mesh_uploads(), 0);
    assert_eq!(session.renderer().props(), 0);
}

#[test]
fn mesh_without_material_slots_is_skipped() {
    let mut session = created_session();
    let mut scene = instanced_scene(0);
    scene.add_object(mesh_object(ObjectId(9), vec![]), Mat4::IDENTITY);
    let stats = session.reset(&scene).unwrap().unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(session.renderer().mesh_uploads(), 0);
}

#[test]
fn empty_slot_uses_default_material() {
    let mut session = created_session();
    let mut scene = instanced_scene(0);
    scene.add_object(mesh_object(ObjectId(9), vec![None]), Mat4::IDENTITY);
    session.reset(&scene).unwrap();
    let renderer = session.renderer();
    assert_eq!(renderer.mesh_uploads(), 1);
    let Some(Call::CreateMaterial { descriptor, .. }) = renderer
        .calls
        .iter()
        .find(|c| matches!(c, Call::CreateMaterial { .. }))
    else {
        panic!("no material created");
    };
    assert!(descriptor.contains("Substitute"));
}

#[test]
fn lights_are_emitters_hidden_from_camera() {
    let mut session = created_session();
    let mut scene = instanced_scene(0);
    scene.add_object(
        SceneObject {
            id: LAMP,
            name: "Lamp".into(),
            data: ObjectData::Light(HostLight {
                kind: LightKind::Point { radius: 0.5 },
                energy: 100.0,
                color: [1.0, 1.0, 1.0],
            }),
        },
        Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
    );
    scene.add_object(
        SceneObject {
            id: SUN,
            name: "Sun".into(),
            data: ObjectData::Light(HostLight {
                kind: LightKind::Sun { angle: 0.01 },
                energy: 3.0,
                color: [1.0, 1.0, 1.0],
            }),
        },
        Mat4::IDENTITY,
    );
    let stats = session.reset(&scene).unwrap().unwrap();
    assert_eq!(stats.lights, 2);

    let renderer = session.renderer();
    assert_eq!(renderer.lights(), 2);
    assert!(renderer.calls.contains(&Call::CreateProp {
        shape: Shape::Primitive(Primitive::Sphere),
        materials: vec![zyg_core::MaterialHandle(1)],
    }));
    assert_eq!(
        renderer.count(|c| matches!(c, Call::SetVisibility(_, v) if *v == Visibility::EMITTER)),
        2
    );
    assert!(renderer
        .calls
        .iter()
        .any(|c| matches!(c, Call::CreateMaterial { descriptor, .. } if descriptor.contains("Radiant_intensity"))));
    let lamp = Transform::point_light(&Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)), 0.5);
    assert!(renderer.transforms().iter().any(|(_, t)| *t == lamp));
}

#[test]
fn zero_angle_sun_gets_finite_intensity() {
    let mut session = created_session();
    let mut scene = instanced_scene(0);
    scene.add_object(
        SceneObject {
            id: SUN,
            name: "Sun".into(),
            data: ObjectData::Light(HostLight {
                kind: LightKind::Sun { angle: 0.0 },
                energy: 3.0,
                color: [1.0, 1.0, 1.0],
            }),
        },
        Mat4::IDENTITY,
    );
    let stats = session.reset(&scene).unwrap().unwrap();
    assert_eq!(stats.lights, 1);

    let descriptors: Vec<_> = session
        .renderer()
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::CreateMaterial { descriptor, .. } => Some(descriptor.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(descriptors.len(), 1);
    assert!(descriptors[0].contains("Radiant_intensity"));
    assert!(!descriptors[0].contains("null"));
}

#[test]
fn unsupported_objects_are_ignored() {
    let mut session = created_session();
    let mut scene = instanced_scene(0);
    scene.add_object(
        SceneObject {
            id: ObjectId(20),
            name: "Spot".into(),
            data: ObjectData::Light(HostLight {
                kind: LightKind::Unsupported { kind: "SPOT".into() },
                energy: 1.0,
                color: [1.0, 1.0, 1.0],
            }),
        },
        Mat4::IDENTITY,
    );
    scene.add_object(
        SceneObject {
            id: ObjectId(21),
            name: "Empty".into(),
            data: ObjectData::Other,
        },
        Mat4::IDENTITY,
    );
    scene.instances.push(Instance::new(ObjectId(99), Mat4::IDENTITY));
    let stats = session.reset(&scene).unwrap().unwrap();
    assert_eq!(stats.ignored, 3);
    assert_eq!(session.renderer().props(), 0);
}

#[test]
fn environment_image_is_uploaded_and_referenced() {
    let mut session = created_session();
    let mut scene = instanced_scene(0);
    let sky = EnvironmentImage {
        id: 77,
        name: "sky".into(),
        width: 2,
        height: 2,
        channels: 3,
        pixels: vec![0.5; 12],
    };
    scene.world = Some(World {
        color: [0.0, 0.0, 0.0],
        strength: 1.0,
        environment: Some(sky.clone()),
    });
    session.reset(&scene).unwrap();

    let renderer = session.renderer();
    assert!(renderer.calls.contains(&Call::CreateImage {
        id: 77,
        width: 2,
        height: 2,
        channels: 3
    }));
    assert!(renderer.calls.iter().any(|c| matches!(
        c,
        Call::CreateMaterial { image: Some(_), descriptor } if descriptor.contains("Repeat")
    )));
    assert!(renderer.calls.contains(&Call::CreateProp {
        shape: Shape::Primitive(Primitive::InfiniteSphere),
        materials: vec![zyg_core::MaterialHandle(2)],
    }));
    assert!(renderer
        .transforms()
        .iter()
        .any(|(_, t)| *t == Transform::ENVIRONMENT));

    assert!(session.sync_environment_image(&sky).unwrap());
    let mut other = sky.clone();
    other.id = 78;
    assert!(!session.sync_environment_image(&other).unwrap());
    assert_eq!(
        session
            .renderer()
            .count(|c| matches!(c, Call::ImageUpdate { len: 48, .. })),
        1
    );
}

#[test]
fn flat_background_without_image() {
    let mut session = created_session();
    let mut scene = instanced_scene(0);
    scene.world = Some(World {
        color: [0.05, 0.1, 0.2],
        strength: 1.0,
        environment: None,
    });
    session.reset(&scene).unwrap();
    let renderer = session.renderer();
    assert_eq!(renderer.count(|c| matches!(c, Call::CreateImage { .. })), 0);
    assert!(renderer.calls.iter().any(|c| matches!(
        c,
        Call::CreateMaterial { image: None, descriptor } if descriptor.contains("Radiance")
    )));
}

#[test]
fn motion_keyframes_use_frame_transforms() {
    let mut session = created_session();
    let mut scene = instanced_scene(1);
    scene.instances[0].motion = vec![
        Mat4::IDENTITY,
        Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)),
    ];
    session.reset(&scene).unwrap();
    let renderer = session.renderer();
    assert_eq!(
        renderer.count(|c| matches!(c, Call::SetTransformationFrame(..))),
        2
    );
    // Only the camera gets a static transform.
    assert_eq!(renderer.transforms().len(), 1);
}

#[test]
fn render_copies_framebuffer() {
    let mut session = created_session();
    session.renderer_mut().clear_color = [0.1, 0.2, 0.3, 1.0];
    let mut scene = instanced_scene(1);
    scene.frame = 12;
    session.reset(&scene).unwrap();

    let framebuffer = session.render().unwrap().unwrap();
    assert_eq!((framebuffer.width, framebuffer.height), (8, 4));
    assert_eq!(framebuffer.pixels.len(), 32);
    assert!(framebuffer.pixels.iter().all(|p| *p == [0.1, 0.2, 0.3, 1.0]));
    assert!(session.renderer().calls.contains(&Call::RenderFrame(12)));

    // Progressive refinement: render again without a reset.
    let mut host = zyg_core::Framebuffer::new(1, 1);
    assert!(session.render_into(&mut host).unwrap());
    assert_eq!(host.pixels.len(), 32);
    assert_eq!(session.renderer().count(|c| matches!(c, Call::RenderFrame(_))), 2);
    session.finish();
}

#[test]
fn calls_before_create_are_no_ops() {
    let mut session = Session::new(MockRenderer::new(), SessionConfig::default());
    assert!(session.reset(&instanced_scene(1)).unwrap().is_none());
    assert!(session.render().unwrap().is_none());
    session.finish();
    assert!(session.renderer().calls.is_empty());
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[test]
fn render_before_reset_is_a_no_op() {
    let mut session = created_session();
    assert!(session.render().unwrap().is_none());
    assert_eq!(session.renderer().calls, vec![Call::Init]);
}

#[test]
fn release_is_idempotent() {
    let mut session = created_session();
    session.reset(&instanced_scene(1)).unwrap();
    session.release().unwrap();
    session.release().unwrap();
    assert_eq!(session.state(), SessionState::Released);
    assert_eq!(session.renderer().count(|c| *c == Call::Release), 1);
    assert!(session.cache().is_empty());

    // Released sessions ignore further work.
    assert!(session.reset(&instanced_scene(1)).unwrap().is_none());
    assert!(session.render().unwrap().is_none());
    session.create().unwrap();
    assert_eq!(session.state(), SessionState::Released);
}

#[test]
fn release_before_create_issues_no_call() {
    let mut session = Session::new(MockRenderer::new(), SessionConfig::default());
    session.release().unwrap();
    assert!(session.renderer().calls.is_empty());
}

#[test]
fn renderer_failure_aborts_reset() {
    let mut session = created_session();
    session.renderer_mut().fail_on = Some("su_create_triangle_mesh");
    let err = session.reset(&instanced_scene(3)).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Renderer(RendererError::Call {
            call: "su_create_triangle_mesh",
            code: -1
        })
    ));
    assert_eq!(session.renderer().props(), 0);
    assert!(session.cache().is_empty());
    assert!(session.render().unwrap().is_none());
}

#[test]
fn invalid_mesh_is_reported() {
    let mut session = created_session();
    let mut scene = instanced_scene(1);
    if let Some(ObjectData::Mesh(mesh)) = scene.objects.get_mut(&CUBE).map(|o| &mut o.data) {
        mesh.mesh.loops[2].vertex = 40;
    }
    let err = session.reset(&scene).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidMesh { .. }));
}

#[test]
fn material_edit_patches_in_place() {
    let mut session = created_session();
    let mut scene = instanced_scene(1);
    session.reset(&scene).unwrap();

    let mut edited = paint(1.0, BlendMethod::Opaque);
    if let Some(ShaderNode::PrincipledBsdf(bsdf)) =
        edited.node_tree.as_mut().and_then(|g| g.nodes.first_mut())
    {
        bsdf.roughness = 0.9;
    }
    assert!(session.sync_material(&edited).unwrap());
    assert!(session.renderer().calls.iter().any(|c| matches!(
        c,
        Call::MaterialUpdate(_, patch) if patch.contains("0.9")
    )));

    // Unknown material needs a reset.
    let mut unknown = edited.clone();
    unknown.id = MaterialId(999);
    assert!(!session.sync_material(&unknown).unwrap());

    scene.materials.clear();
    session.reset(&scene).unwrap();
    assert!(!session.sync_material(&edited).unwrap());
}

#[test]
fn sampler_and_integrator_come_from_config() {
    let config = SessionConfig {
        samples_per_pixel: 64,
        ..SessionConfig::default()
    };
    let mut session = Session::new(MockRenderer::new(), config);
    session.create().unwrap();
    session.reset(&instanced_scene(1)).unwrap();
    let renderer = session.renderer();
    assert!(renderer.calls.contains(&Call::CreateSampler(64)));
    assert!(renderer
        .calls
        .iter()
        .any(|c| matches!(c, Call::CreateIntegrator(json) if json.contains("PTMIS"))));
}
