//! # webusage-network
//!
//! 외부 세계와의 통신 어댑터.
//!
//! - [`http_sink`]: `save_data` 저장 서버 + 스냅샷 대상 목록 (`PersistenceSink`, `TargetSource`)
//! - [`fetcher`]: 웹사이트 기록 페이지 GET (`PageFetcher`)
//! - [`native`]: 네이티브 메시징 프레임 위의 브라우저 브리지 (`BrowserHost`, `Notifier`)
//!
//! ```rust,ignore
//! use webusage_network::http_sink::HttpDataSink;
//! use webusage_network::native::NativeBridge;
//!
//! let sink = HttpDataSink::new(&config.server.base_url, &user_id, config.server.request_timeout())?;
//! let (bridge, reader) = NativeBridge::stdio(config.snapshot.response_timeout());
//! ```

pub mod fetcher;
pub mod http_sink;
pub mod native;
