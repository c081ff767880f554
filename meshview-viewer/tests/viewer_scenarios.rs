//! End-to-end viewer behaviour with a recording renderer in place of the GPU

use approx::assert_relative_eq;
use meshview_core::{
    DrawView, LayoutMode, Material, Point3, Scene, SceneNode, Texture, TriangleMesh, ViewRect, ViewerConfig,
};
use meshview_io::{Asset, LoadError};
use meshview_viewer::{
    Completion, LoadJob, Notifier, PointerButton, Renderer, RequestOrigin, RequestTarget, Viewer,
};
use std::path::{Path, PathBuf};

#[derive(Default)]
struct RecordingRenderer {
    uploads: Vec<u64>,
    released: Vec<u64>,
    frames: Vec<Vec<u64>>,
    size: (u32, u32),
}

impl Renderer for RecordingRenderer {
    fn upload(&mut self, key: u64, _scene: &Scene) -> meshview_core::Result<()> {
        self.uploads.push(key);
        Ok(())
    }

    fn release(&mut self, key: u64) {
        self.released.push(key);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn draw(&mut self, views: &[DrawView]) -> meshview_core::Result<()> {
        self.frames.push(views.iter().map(|view| view.key).collect());
        Ok(())
    }
}

#[derive(Default)]
struct CollectingNotifier {
    alerts: Vec<String>,
}

impl Notifier for CollectingNotifier {
    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}

type TestViewer = Viewer<RecordingRenderer, CollectingNotifier>;

fn area() -> ViewRect {
    ViewRect::new(0.0, 0.0, 600.0, 600.0)
}

fn viewer_with(config: ViewerConfig) -> TestViewer {
    Viewer::new(config, area(), RecordingRenderer::default(), CollectingNotifier::default())
}

fn viewer() -> TestViewer {
    viewer_with(ViewerConfig::default())
}

/// Unit cube centred on the origin, two triangles per face
fn cube(name: &str) -> SceneNode {
    let mut vertices = Vec::new();
    for &x in &[-1.0, 1.0] {
        for &y in &[-1.0, 1.0] {
            for &z in &[-1.0, 1.0] {
                vertices.push(Point3::new(x, y, z));
            }
        }
    }
    let faces = vec![
        [0, 1, 3],
        [0, 3, 2],
        [4, 6, 7],
        [4, 7, 5],
        [0, 4, 5],
        [0, 5, 1],
        [2, 3, 7],
        [2, 7, 6],
        [0, 2, 6],
        [0, 6, 4],
        [1, 5, 7],
        [1, 7, 3],
    ];
    let mut root = SceneNode::group(name);
    root.add_child(SceneNode::mesh(
        "cube",
        TriangleMesh::from_vertices_and_faces(vertices, faces),
        Material::default(),
    ));
    root
}

fn red_texture() -> Texture {
    Texture::from_rgba8(1, 1, vec![255, 0, 0, 255]).unwrap()
}

fn request(viewer: &mut TestViewer, path: &str) -> Option<LoadJob> {
    viewer.request(Path::new(path), RequestOrigin::OpenMenu, RequestTarget::Active)
}

fn finish_model(viewer: &mut TestViewer, job: &LoadJob) -> Completion {
    let name = job.path.file_stem().unwrap().to_string_lossy().into_owned();
    viewer.complete(job.ticket, &job.path, Ok(Asset::Model(cube(&name))))
}

fn open(viewer: &mut TestViewer, path: &str) -> Completion {
    let job = request(viewer, path).unwrap();
    finish_model(viewer, &job)
}

#[test]
fn test_opening_a_cube_frames_and_draws_it() {
    let mut viewer = viewer();
    let Completion::Attached(handle) = open(&mut viewer, "cube.obj") else {
        panic!("cube was not attached");
    };

    let active = viewer.layout().active();
    let session = viewer.session(active).unwrap();
    assert_relative_eq!(session.framing.distance, 2.897, epsilon = 1e-3);
    assert_relative_eq!(
        (session.camera.position - session.camera.target).norm(),
        session.framing.distance,
        epsilon = 1e-4
    );
    assert_eq!(session.status.file_name, "cube.obj");
    assert_eq!(session.status.triangle_count, 12);

    // One synchronous frame right after attach
    assert_eq!(viewer.renderer().uploads, vec![handle.key()]);
    assert_eq!(viewer.renderer().frames, vec![vec![handle.key()]]);
    assert!(viewer.notifier().alerts.is_empty());
}

#[test]
fn test_unsupported_file_keeps_scene_and_loop_running() {
    let mut viewer = viewer();
    let Completion::Attached(handle) = open(&mut viewer, "cube.obj") else {
        panic!("cube was not attached");
    };

    assert!(request(&mut viewer, "notes.xyz").is_none());
    assert_eq!(viewer.notifier().alerts, vec!["XYZ files are not supported.".to_string()]);

    let active = viewer.layout().active();
    assert_eq!(viewer.status(active).unwrap().file_name, "cube.obj");

    viewer.frame(0.016);
    viewer.frame(0.016);
    assert_eq!(viewer.renderer().frames.last().unwrap(), &vec![handle.key()]);
    assert!(viewer.renderer().released.is_empty());
}

#[test]
fn test_empty_path_is_ignored_silently() {
    let mut viewer = viewer();
    assert!(viewer
        .request(Path::new(""), RequestOrigin::LaunchArgument, RequestTarget::Active)
        .is_none());
    assert!(viewer.notifier().alerts.is_empty());
}

#[test]
fn test_texture_before_model_alerts_once() {
    let mut viewer = viewer();
    assert!(request(&mut viewer, "wood.png").is_none());

    assert_eq!(
        viewer.notifier().alerts,
        vec!["Open a 3D file before adding textures.".to_string()]
    );
    assert!(viewer.renderer().uploads.is_empty());
    assert!(viewer.sessions().is_empty());
}

#[test]
fn test_texture_applies_to_current_session() {
    let mut viewer = viewer();
    let Completion::Attached(handle) = open(&mut viewer, "cube.obj") else {
        panic!("cube was not attached");
    };

    let job = request(&mut viewer, "red.jpg").unwrap();
    let outcome = viewer.complete(job.ticket, &job.path, Ok(Asset::Texture(red_texture())));

    assert_eq!(outcome, Completion::Textured(handle));
    let active = viewer.layout().active();
    assert_eq!(viewer.status(active).unwrap().texture.as_deref(), Some("red.jpg"));
    assert_eq!(viewer.renderer().uploads, vec![handle.key(), handle.key()]);
}

#[test]
fn test_latest_request_wins_when_loads_finish_out_of_order() {
    let mut viewer = viewer();
    let first = request(&mut viewer, "first.obj").unwrap();
    let second = request(&mut viewer, "second.fbx").unwrap();

    assert!(matches!(finish_model(&mut viewer, &second), Completion::Attached(_)));
    assert_eq!(finish_model(&mut viewer, &first), Completion::Stale);

    let active = viewer.layout().active();
    assert_eq!(viewer.status(active).unwrap().file_name, "second.fbx");
    assert_eq!(viewer.sessions().len(), 1);
}

#[test]
fn test_stale_result_finishing_first_is_dropped() {
    let mut viewer = viewer();
    let first = request(&mut viewer, "first.obj").unwrap();
    let second = request(&mut viewer, "second.glb").unwrap();

    assert_eq!(finish_model(&mut viewer, &first), Completion::Stale);
    assert!(viewer.sessions().is_empty());
    assert!(matches!(finish_model(&mut viewer, &second), Completion::Attached(_)));
}

#[test]
fn test_replacing_a_model_releases_the_old_session() {
    let mut viewer = viewer();
    let Completion::Attached(old) = open(&mut viewer, "old.obj") else {
        panic!("old model was not attached");
    };
    let Completion::Attached(new) = open(&mut viewer, "new.stl") else {
        panic!("new model was not attached");
    };

    assert_ne!(old, new);
    assert!(!viewer.sessions().contains(old));
    assert_eq!(viewer.sessions().len(), 1);
    assert_eq!(viewer.renderer().released, vec![old.key()]);
    assert_eq!(viewer.renderer().frames.last().unwrap(), &vec![new.key()]);
}

#[test]
fn test_texture_for_replaced_session_is_discarded() {
    let mut viewer = viewer();
    open(&mut viewer, "old.obj");
    let texture = request(&mut viewer, "red.png").unwrap();
    open(&mut viewer, "new.obj");

    let outcome = viewer.complete(texture.ticket, &texture.path, Ok(Asset::Texture(red_texture())));
    assert_eq!(outcome, Completion::Stale);

    let active = viewer.layout().active();
    assert_eq!(viewer.status(active).unwrap().texture, None);
}

#[test]
fn test_failed_load_alerts_and_keeps_scene() {
    let mut viewer = viewer();
    open(&mut viewer, "cube.obj");

    let job = request(&mut viewer, "broken.gltf").unwrap();
    let err = LoadError::Mesh {
        format: "GLTF",
        path: PathBuf::from("broken.gltf"),
        reason: "unexpected end of file".into(),
    };
    assert_eq!(viewer.complete(job.ticket, &job.path, Err(err)), Completion::Failed);

    assert_eq!(
        viewer.notifier().alerts,
        vec!["Failed to load GLTF file broken.gltf: unexpected end of file".to_string()]
    );
    let active = viewer.layout().active();
    assert_eq!(viewer.status(active).unwrap().file_name, "cube.obj");
}

#[test]
fn test_stl_can_be_disabled() {
    let mut viewer = viewer_with(ViewerConfig {
        enable_stl: false,
        ..ViewerConfig::default()
    });
    assert!(request(&mut viewer, "part.stl").is_none());
    assert_eq!(viewer.notifier().alerts, vec!["STL files are not supported.".to_string()]);
}

#[test]
fn test_multi_layout_keeps_independent_sessions() {
    let mut viewer = viewer_with(ViewerConfig {
        layout: LayoutMode::Multi,
        ..ViewerConfig::default()
    });
    let first = viewer.layout().active();
    let second = viewer.add_viewport().unwrap();

    // Side by side: the second viewport is the right half
    let job = viewer
        .request(
            Path::new("dropped.obj"),
            RequestOrigin::DragAndDrop,
            RequestTarget::At { x: 450.0, y: 300.0 },
        )
        .unwrap();
    assert_eq!(job.ticket.viewport, second);
    finish_model(&mut viewer, &job);

    let job = viewer
        .request(Path::new("menu.obj"), RequestOrigin::OpenMenu, RequestTarget::Viewport(first))
        .unwrap();
    finish_model(&mut viewer, &job);

    assert_eq!(viewer.sessions().len(), 2);
    assert_eq!(viewer.status(first).unwrap().file_name, "menu.obj");
    assert_eq!(viewer.status(second).unwrap().file_name, "dropped.obj");
    assert!(viewer.renderer().released.is_empty());

    viewer.frame(0.016);
    assert_eq!(viewer.renderer().frames.last().unwrap().len(), 2);

    // Half-width viewports frame with a 0.5 aspect
    let session = viewer.session(second).unwrap();
    assert_relative_eq!(session.camera.aspect_ratio, 0.5);
}

#[test]
fn test_empty_viewports_are_reported_for_placeholders() {
    let mut viewer = viewer_with(ViewerConfig {
        layout: LayoutMode::Multi,
        ..ViewerConfig::default()
    });
    let first = viewer.layout().active();
    let second = viewer.add_viewport().unwrap();
    let job = viewer
        .request(Path::new("a.obj"), RequestOrigin::OpenMenu, RequestTarget::Viewport(second))
        .unwrap();
    finish_model(&mut viewer, &job);

    let empty: Vec<_> = viewer.empty_viewports().map(|viewport| viewport.id).collect();
    assert_eq!(empty, vec![first]);
}

#[test]
fn test_closing_a_viewport_releases_its_session_and_pending_loads() {
    let mut viewer = viewer_with(ViewerConfig {
        layout: LayoutMode::Multi,
        ..ViewerConfig::default()
    });
    let second = viewer.add_viewport().unwrap();
    let job = viewer
        .request(Path::new("a.obj"), RequestOrigin::OpenMenu, RequestTarget::Viewport(second))
        .unwrap();
    let Completion::Attached(handle) = finish_model(&mut viewer, &job) else {
        panic!("model was not attached");
    };
    let pending = viewer
        .request(Path::new("b.obj"), RequestOrigin::OpenMenu, RequestTarget::Viewport(second))
        .unwrap();

    assert!(viewer.close_viewport(second));
    assert_eq!(viewer.renderer().released, vec![handle.key()]);
    assert!(viewer.sessions().is_empty());
    assert_eq!(finish_model(&mut viewer, &pending), Completion::Stale);

    // The last viewport stays
    let last = viewer.layout().active();
    assert!(!viewer.close_viewport(last));
}

#[test]
fn test_resize_updates_aspect_and_surface() {
    let mut viewer = viewer();
    open(&mut viewer, "cube.obj");
    viewer.resize(ViewRect::new(0.0, 0.0, 800.0, 400.0), 800, 400);

    let active = viewer.layout().active();
    assert_relative_eq!(viewer.session(active).unwrap().camera.aspect_ratio, 2.0);
    assert_eq!(viewer.renderer().size, (800, 400));
}

#[test]
fn test_drag_orbits_without_changing_distance() {
    let mut config = ViewerConfig::default();
    config.controls.auto_rotate = false;
    config.controls.enable_damping = false;
    let mut viewer = viewer_with(config);
    open(&mut viewer, "cube.obj");

    let active = viewer.layout().active();
    let before = viewer.session(active).unwrap().camera.position;

    viewer.pointer_down(PointerButton::Primary, 300.0, 300.0);
    viewer.pointer_move(360.0, 300.0);
    viewer.pointer_up();
    viewer.frame(0.016);

    let camera = &viewer.session(active).unwrap().camera;
    assert!((camera.position - before).norm() > 1e-3);
    assert_relative_eq!((camera.position - camera.target).norm(), 2.897, epsilon = 1e-3);
}

#[test]
fn test_scroll_zooms_in() {
    let mut config = ViewerConfig::default();
    config.controls.auto_rotate = false;
    config.controls.enable_damping = false;
    let mut viewer = viewer_with(config);
    open(&mut viewer, "cube.obj");

    viewer.scroll(300.0, 300.0, 1.0);
    viewer.frame(0.016);

    let active = viewer.layout().active();
    let camera = &viewer.session(active).unwrap().camera;
    assert!((camera.position - camera.target).norm() < 2.897);
}
