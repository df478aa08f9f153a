//! HTTP 路由处理器
//!
//! - `POST /submit`：校验表单并追加一条记录
//! - 其他任何路径：返回首页

use std::borrow::Cow;
use std::path::PathBuf;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};

use super::html;
use crate::boards::{PortalRequest, PortalResponse};
use crate::config::StorageConfig;
use crate::error::{KioskError, Result};
use crate::queue::MessageQueue;
use crate::record::Record;

const TEXT_HTML: &str = "text/html";
const TEXT_PLAIN: &str = "text/plain";

/// 存储分区上的页面文件
#[derive(Debug, Clone)]
pub struct Assets {
    root: PathBuf,
    landing: String,
    confirmation: String,
}

impl Assets {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            root: storage.root.clone(),
            landing: storage.landing_asset.clone(),
            confirmation: storage.confirmation_asset.clone(),
        }
    }

    fn load(&self, name: &str) -> Result<Vec<u8>> {
        std::fs::read(self.root.join(name)).map_err(|_| KioskError::AssetMissing(name.to_string()))
    }
}

/// 门户请求处理，持有队列的写入端
pub struct PortalHandler {
    queue: MessageQueue,
    assets: Assets,
}

impl PortalHandler {
    pub fn new(queue: MessageQueue, assets: Assets) -> Self {
        Self { queue, assets }
    }

    pub fn handle(&self, req: &PortalRequest) -> PortalResponse {
        log::info!("[Portal] {} {}", req.method(), req.uri());
        match (req.method(), req.uri().path()) {
            (&Method::POST, "/submit") => self.handle_submit(req),
            _ => self.handle_index(),
        }
    }

    /// 交还队列，之后门户不再写入
    pub fn into_queue(self) -> MessageQueue {
        self.queue
    }

    fn handle_index(&self) -> PortalResponse {
        match self.assets.load(&self.assets.landing) {
            Ok(body) => respond(StatusCode::OK, TEXT_HTML, body),
            Err(e) => {
                log::warn!("[Portal] {}", e);
                respond(
                    StatusCode::NOT_FOUND,
                    TEXT_PLAIN,
                    html::asset_missing(&self.assets.landing).into_bytes(),
                )
            }
        }
    }

    fn handle_submit(&self, req: &PortalRequest) -> PortalResponse {
        let record = match parse_submission(req) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("[Portal] rejected submission: {}", e);
                return respond(
                    StatusCode::BAD_REQUEST,
                    TEXT_PLAIN,
                    html::BAD_REQUEST.as_bytes().to_vec(),
                );
            }
        };

        if let Err(e) = self.queue.append(&record.to_line()) {
            log::error!("[Portal] failed to save submission from {}: {}", record.name, e);
        } else {
            log::info!("[Portal] saved submission from {}", record.name);
        }

        match self.assets.load(&self.assets.confirmation) {
            Ok(body) => respond(StatusCode::OK, TEXT_HTML, body),
            Err(e) => {
                log::warn!("[Portal] {}", e);
                respond(
                    StatusCode::OK,
                    TEXT_HTML,
                    html::SAVED_FALLBACK_HTML.as_bytes().to_vec(),
                )
            }
        }
    }
}

/// 从查询串和 urlencoded 表单体中取 `name` / `msg`，先出现的优先
fn parse_submission(req: &PortalRequest) -> Result<Record> {
    let query = req.uri().query().unwrap_or_default().as_bytes();
    let args: Vec<(Cow<'_, str>, Cow<'_, str>)> = url::form_urlencoded::parse(query)
        .chain(url::form_urlencoded::parse(req.body()))
        .collect();

    let arg = |key: &str| {
        args.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| &**v)
    };

    let name = arg("name")
        .filter(|n| !n.trim().is_empty())
        .ok_or(KioskError::Validation("name"))?;
    let msg = arg("msg").unwrap_or_default();

    Ok(Record::new(name, msg))
}

fn respond(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> PortalResponse {
    let mut resp = http::Response::new(body);
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
        handler: PortalHandler,
    }

    fn fixture(with_assets: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        if with_assets {
            std::fs::write(dir.path().join("index.html"), "<form>landing</form>").unwrap();
            std::fs::write(dir.path().join("thanks.html"), "<p>thanks</p>").unwrap();
        }
        let handler = PortalHandler::new(
            MessageQueue::new(storage.queue_path()),
            Assets::new(&storage),
        );
        Fixture { dir, handler }
    }

    fn get(uri: &str) -> PortalRequest {
        http::Request::get(uri).body(Vec::new()).unwrap()
    }

    fn post(uri: &str, body: &str) -> PortalRequest {
        http::Request::post(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body.as_bytes().to_vec())
            .unwrap()
    }

    fn content_type(resp: &PortalResponse) -> &str {
        resp.headers()[CONTENT_TYPE].to_str().unwrap()
    }

    #[test]
    fn index_serves_landing() {
        let f = fixture(true);
        for uri in ["/", "/generate_204", "/hotspot-detect.html", "/submit"] {
            let resp = f.handler.handle(&get(uri));
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(content_type(&resp), TEXT_HTML);
            assert_eq!(resp.body(), b"<form>landing</form>");
        }
    }

    #[test]
    fn missing_landing_is_404() {
        let f = fixture(false);
        let resp = f.handler.handle(&get("/"));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.body(), b"Error: index.html missing.");
    }

    #[test]
    fn submit_appends_exactly_one_line() {
        let f = fixture(true);
        let resp = f.handler.handle(&post("/submit", "name=Alice&msg=Hello+world%21"));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), b"<p>thanks</p>");

        let queue = f.handler.into_queue();
        assert_eq!(queue.read_all().collect::<Vec<_>>(), vec!["Alice: Hello world!"]);
        drop(f.dir);
    }

    #[test]
    fn submit_without_msg_and_with_query_args() {
        let f = fixture(true);
        f.handler.handle(&post("/submit", "name=Bob"));
        f.handler.handle(&post("/submit?name=Carol&msg=hi", ""));

        let queue = f.handler.into_queue();
        assert_eq!(queue.read_all().collect::<Vec<_>>(), vec!["Bob: ", "Carol: hi"]);
    }

    #[test]
    fn submit_without_name_is_rejected() {
        let f = fixture(true);
        for body in ["msg=hello", "", "name=&msg=x", "name=+++"] {
            let resp = f.handler.handle(&post("/submit", body));
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(content_type(&resp), TEXT_PLAIN);
        }
        assert!(f.handler.into_queue().is_empty());
    }

    #[test]
    fn submit_falls_back_without_confirmation_page() {
        let f = fixture(false);
        let resp = f.handler.handle(&post("/submit", "name=Dan&msg=yo"));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), html::SAVED_FALLBACK_HTML.as_bytes());
        assert_eq!(f.handler.into_queue().len(), 1);
    }

    #[test]
    fn embedded_newlines_stay_on_one_line() {
        let f = fixture(true);
        f.handler.handle(&post("/submit", "name=Eve&msg=a%0Ab"));
        let queue = f.handler.into_queue();
        assert_eq!(queue.read_all().collect::<Vec<_>>(), vec!["Eve: a b"]);
    }
}
