
use mockito::ServerGuard;
use serde_json::json;
use videoflix::api::VideoflixApi;
use videoflix::config::ApiConfig;

pub fn api_for(server: &ServerGuard) -> VideoflixApi {
    VideoflixApi::new(&ApiConfig {
        base_url: format!("{}/api/", server.url()),
        request_timeout_secs: Some(5),
    })
    .expect("Failed to build API client")
}

pub fn resume_body(slug: &str, progress_seconds: u64) -> String {
    json!({
        "movie": {
            "id": 7,
            "title": "Sintel",
            "slug": slug,
            "hls_url": format!("https://cdn.example.com/{}/master.m3u8", slug),
            "description": "A girl searches for her dragon",
            "genre": "fantasy",
            "thumbnail_url": "https://cdn.example.com/sintel.jpg",
            "created_at": "2024-11-02T10:00:00Z"
        },
        "progress_seconds": progress_seconds
    })
    .to_string()
}
