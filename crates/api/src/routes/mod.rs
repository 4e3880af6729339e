//! HTTP handlers

pub mod analyze;
pub mod artifacts;
pub mod health;

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use base64::Engine;
    use frame_codec::GrayView;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use visibility::{DetectionBox, FaceLocator, VisibilityError};

    use crate::{create_router, AppState, Settings};

    /// Brightness of the frames the stub locator maps to each verdict
    pub const NO_FACE: u8 = 20;
    pub const ONE_FACE: u8 = 128;
    pub const TWO_FACES: u8 = 240;

    /// Reads the verdict off mean brightness so tests can pick it per frame
    pub struct StubLocator;

    impl FaceLocator for StubLocator {
        fn locate(&self, gray: &GrayView) -> Result<Vec<DetectionBox>, VisibilityError> {
            let mean = gray.data.iter().map(|&p| p as u64).sum::<u64>() / gray.data.len().max(1) as u64;
            Ok(match mean {
                0..=63 => vec![],
                64..=191 => vec![DetectionBox::new(60, 20, 60, 60)],
                _ => vec![DetectionBox::new(10, 10, 50, 50), DetectionBox::new(120, 20, 50, 50)],
            })
        }

        fn backend(&self) -> &'static str {
            "stub"
        }
    }

    /// Base64 PNG of a solid 200x100 frame
    pub fn frame_payload(brightness: u8) -> String {
        let img = image::RgbImage::from_pixel(200, 100, image::Rgb([brightness; 3]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
    }

    /// Settings with no persistence window, rooted in a fresh temp dir
    pub fn test_settings(dir: &TempDir) -> Settings {
        Settings {
            suspicious_frames_dir: dir.path().join("frames").display().to_string(),
            min_suspicious_duration: 0.0,
            frame_save_cooldown: 5.0,
            ..Default::default()
        }
    }

    pub fn test_state(settings: Settings) -> Arc<AppState> {
        Arc::new(AppState::new(settings, Arc::new(StubLocator)).unwrap())
    }

    pub fn app(state: &Arc<AppState>) -> Router {
        create_router(Arc::clone(state))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    pub async fn post_raw(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let (status, bytes) = send(app, request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        post_raw(app, uri, body.to_string()).await
    }

    pub async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(app, request).await
    }
}
