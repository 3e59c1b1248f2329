//! Integration tests for the HTTP backend and the operations built on it

use collagekit::rendering::GridDocument;
use collagekit::{ClientConfig, CollageClient, Error, Position, Slot};
use std::io::{Cursor, Read};
use std::sync::{Mutex, Once, OnceLock};
use tiny_http::{Method, Response, Server};

static INIT: Once = Once::new();

/// Form bodies received by POST endpoints: (path, fields)
fn received() -> &'static Mutex<Vec<(String, Vec<(String, String)>)>> {
    static RECEIVED: OnceLock<Mutex<Vec<(String, Vec<(String, String)>)>>> = OnceLock::new();
    RECEIVED.get_or_init(|| Mutex::new(Vec::new()))
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 200, 10, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn typed(data: Vec<u8>, content_type: &str) -> Response<Cursor<Vec<u8>>> {
    Response::from_data(data).with_header(
        format!("Content-Type: {}", content_type)
            .parse::<tiny_http::Header>()
            .unwrap(),
    )
}

fn json(body: &str) -> Response<Cursor<Vec<u8>>> {
    Response::from_string(body).with_header(
        "Content-Type: application/json"
            .parse::<tiny_http::Header>()
            .unwrap(),
    )
}

/// Start a fake collage backend
fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18090").unwrap();
            for mut request in server.incoming_requests() {
                let url = request.url().to_string();
                let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
                let path = path.to_string();
                let query = query.to_string();

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let form: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                let field = |name: &str| form.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()).unwrap_or_default();

                let response = match (request.method(), path.as_str()) {
                    (Method::Get, "/getImages") => json(r#"{"image_files": ["cat.jpg", "dog.png"]}"#),
                    (Method::Get, "/uploaded_images/cat.jpg") => typed(png(120, 40), "image/jpeg"),
                    (Method::Get, "/uploaded_images/dog.png") => typed(png(16, 16), "image/png; charset=binary"),
                    (Method::Get, "/getArray") => match query.as_str() {
                        "component_name=heart" => json(r#"[[1, "cat.jpg"], [0, "[]"]]"#),
                        "component_name=star" => json(r#"[[2, "dog.png"], [0, "cat.jpg"], [1, "gone.png"]]"#),
                        "component_name=broken" => json(r#"{"detail": "no such component"}"#),
                        _ => Response::from_string("unavailable").with_status_code(503),
                    },
                    (Method::Post, "/positions") => {
                        let failing = field("componentName") == "fail";
                        received().lock().unwrap().push((path.clone(), form.clone()));
                        if failing {
                            Response::from_string("boom").with_status_code(500)
                        } else {
                            Response::from_string("")
                        }
                    }
                    (Method::Post, "/clearCollage") => {
                        received().lock().unwrap().push((path.clone(), form.clone()));
                        json("{}")
                    }
                    (Method::Post, "/update_image_selection_mode") => {
                        json(&format!(r#"{{"mode": "{}"}}"#, field("new_mode")))
                    }
                    (Method::Post, "/new_selection") => json(&format!(
                        r#"{{"component": "{}", "target": {}}}"#,
                        field("component_name"),
                        field("target_id")
                    )),
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18090".to_string()
}

fn client() -> CollageClient {
    let base = start_test_server();
    let config = ClientConfig { api_url: base, timeout_ms: 5000, ..Default::default() };
    collagekit::new_client(config).expect("Failed to create client")
}

#[test]
fn test_sync_scenario_three_slots() {
    let client = client();
    let untouched = Slot { src: Some("keep".into()), file_name: Some("keep.jpg".into()), scaled_src: None };
    let mut slots = vec![
        Slot { src: Some("x".into()), file_name: Some("x.jpg".into()), scaled_src: None },
        Slot::empty(),
        untouched.clone(),
    ];

    let report = client.sync_grid("heart", &mut slots).expect("sync");

    assert_eq!(slots[0], Slot::empty());
    assert_eq!(slots[1].src.as_deref(), Some("http://127.0.0.1:18090/uploaded_images/cat.jpg"));
    assert_eq!(slots[1].file_name.as_deref(), Some("cat.jpg"));
    assert_eq!(slots[2], untouched);
    assert_eq!((report.assigned, report.cleared), (1, 1));
}

#[test]
fn test_sync_with_thumbnails_reports_per_slot_failures() {
    let client = client();
    let mut slots = vec![Slot::empty(); 4];

    let report = client.update_collage_items("star", &mut slots).expect("sync");

    // sorted by id: 0 cat.jpg, 1 gone.png, 2 dog.png
    assert_eq!(slots[0].file_name.as_deref(), Some("cat.jpg"));
    assert!(slots[0].scaled_src.as_deref().unwrap().starts_with("data:image/jpeg;base64,"));
    assert_eq!(slots[1].file_name.as_deref(), Some("gone.png"));
    assert_eq!(slots[1].scaled_src, None);
    assert!(slots[2].scaled_src.is_some());
    assert_eq!(slots[3], Slot::empty());

    assert_eq!(report.scale_failures.len(), 1);
    let (index, err) = &report.scale_failures[0];
    assert_eq!(*index, 1);
    assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
}

#[test]
fn test_sync_rejects_bad_shapes_and_statuses_without_touching_slots() {
    let client = client();
    let before = vec![Slot { src: Some("a".into()), file_name: Some("a".into()), scaled_src: None }; 2];

    let mut slots = before.clone();
    let err = client.sync_grid("broken", &mut slots).unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)), "got {:?}", err);
    assert_eq!(slots, before);

    let err = client.sync_grid("missing", &mut slots).unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 503, .. }), "got {:?}", err);
    assert_eq!(slots, before);
}

#[test]
fn test_positions_are_posted_as_form_fields() {
    let client = client();
    let html = r#"<div class="grid-container" style="left: 5px; top: 5px; width: 200px; height: 100px">
        <div class="grid-item" style="left: 100px; top: 0; width: 90px; height: 90px"><img src="b.jpg"></div>
        <div class="grid-item" style="left: 0; top: 0; width: 90px; height: 90px"><img src="a.jpg"></div>
    </div>"#;
    let doc = GridDocument::parse(html).expect("parse");
    let slots = vec![
        Slot { src: None, file_name: Some("b.jpg".into()), scaled_src: None },
        Slot { src: None, file_name: Some("a.jpg".into()), scaled_src: None },
    ];

    let sent = client.submit_layout(&doc, &slots, "posted", Some("a sunny beach")).expect("submit");
    assert_eq!(sent.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 0]);

    let received = received().lock().unwrap();
    let (_, form) = received
        .iter()
        .find(|(path, form)| path == "/positions" && form.iter().any(|(k, v)| k == "componentName" && v == "posted"))
        .expect("positions request recorded");
    let get = |name: &str| form.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
    assert_eq!(get("user_prompt").as_deref(), Some("a sunny beach"));

    let positions: Vec<Position> = serde_json::from_str(&get("positions").unwrap()).unwrap();
    assert_eq!(positions, sent);
    assert_eq!(positions[0].left, 0.0);
    assert_eq!(positions[0].file_name.as_deref(), Some("a.jpg"));
}

#[test]
fn test_positions_server_error_is_returned_not_thrown() {
    let client = client();
    let doc = GridDocument::from_slots(&[Slot::empty()], 1, 40.0, 0.0);
    let slots = vec![Slot::empty()];

    let result = client.submit_layout(&doc, &slots, "fail", None);

    match result {
        Err(Error::HttpStatus { status, endpoint }) => {
            assert_eq!(status, 500);
            assert_eq!(endpoint, "/positions");
        }
        other => panic!("expected HTTP 500, got {:?}", other),
    }
    // the session is still usable afterwards
    assert!(client.state().photo_urls().is_empty());
}

#[test]
fn test_gallery_selection_and_clear() {
    let mut client = client();

    assert_eq!(client.refresh_gallery().expect("gallery"), 2);
    assert_eq!(client.state().photo_urls().len(), client.state().photo_blobs().len());
    assert!(client.state().photo_urls()[1].ends_with("/uploaded_images/dog.png"));
    // media types come from Content-Type, not from the bytes
    assert_eq!(client.state().photo_blobs()[0].mime, "image/jpeg");
    assert_eq!(client.state().photo_blobs()[1].mime, "image/png");

    client.state_mut().select(0).expect("gallery index");
    let answer = client.new_selection("heart", 1).expect("selection");
    assert_eq!(answer["target"], 1);
    assert_eq!(answer["component"], "heart");
    // slot ids and gallery indices are unrelated
    assert_eq!(client.state().selected_image(), Some(0));

    let mode = client.update_selection_mode("color").expect("mode");
    assert_eq!(mode["mode"], "color");

    client.clear_collage("cleared").expect("clear");
    assert!(received()
        .lock()
        .unwrap()
        .iter()
        .any(|(path, form)| path == "/clearCollage" && form.contains(&("component_name".to_string(), "cleared".to_string()))));

    client.close();
}

#[test]
fn test_export_through_backend_images() {
    let client = client();
    let slots = vec![
        Slot { src: Some("http://127.0.0.1:18090/uploaded_images/dog.png".into()), file_name: Some("dog.png".into()), scaled_src: None },
        Slot::empty(),
    ];
    let mut doc = GridDocument::from_slots(&slots, 2, 30.0, 0.0);
    let before = doc.clone();

    let blob = client.export_collage(&mut doc, 2.0).expect("export");

    assert_eq!(doc, before);
    let img = image::load_from_memory(&blob.bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (120, 60));
    assert_eq!(img.get_pixel(30, 30).0, [10, 200, 10, 255]);
    assert_eq!(img.get_pixel(90, 30).0, [0, 0, 0, 0]);
}
