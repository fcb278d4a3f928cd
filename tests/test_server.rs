//! Local HTTP server for tests
//!
//! Serves a small imitation of the evidence photo viewer so browser tests do
//! not depend on the real portal. The viewer page lives in an iframe of the
//! portal page, as it does in production.
//!
//! Each server instance runs on a random available port for perfect test isolation.

#![allow(dead_code)]

use std::net::SocketAddr;
use tokio::sync::oneshot;
use warp::Filter;

pub const PARCEL_ID: &str = "F24ABC-1-2";
pub const PHOTO_COUNT: u32 = 3;

pub const PORTAL_HTML: &str = r#"<!DOCTYPE html>
<html lang="zh">
<head><title>举证审核</title></head>
<body style="margin:0">
    <div class="header">项目编号：F24ABC</div>
    <iframe src="/viewer" style="width:100%;height:600px;border:0"></iframe>
</body>
</html>"#;

pub const VIEWER_HTML: &str = r#"<!DOCTYPE html>
<html lang="zh">
<head>
    <title>举证照片</title>
    <style>
        .el-carousel__item { display: none; width: 400px; height: 300px; }
        .el-carousel__item.is-active { display: block; }
        .photo { width: 400px; height: 300px; background: #2a6; }
    </style>
</head>
<body>
    <div class="info"><span>地块编号：</span><span>F24ABC-1-2</span></div>
    <div class="el-carousel">
        <div class="el-carousel__item is-active"><div class="photo"></div></div>
        <div class="el-carousel__item"><div class="photo"></div></div>
        <div class="el-carousel__item"><div class="photo"></div></div>
        <ul>
            <li class="el-carousel__indicator is-active"><button aria-label="1"></button></li>
            <li class="el-carousel__indicator"><button aria-label="2"></button></li>
            <li class="el-carousel__indicator"><button aria-label="3"></button></li>
        </ul>
        <button class="el-carousel__arrow el-carousel__arrow--right">&gt;</button>
    </div>
    <div class="pager">1/3</div>
    <div id="messages"></div>
    <script>
        let index = 0;
        const items = document.querySelectorAll('.el-carousel__item');
        const dots = document.querySelectorAll('.el-carousel__indicator');
        document.querySelector('.el-carousel__arrow--right').addEventListener('click', () => {
            if (index >= items.length - 1) {
                document.getElementById('messages').innerHTML =
                    '<div class="el-message"><p class="el-message__content">已经是最后一张了</p></div>';
                return;
            }
            items[index].classList.remove('is-active');
            dots[index].classList.remove('is-active');
            index += 1;
            items[index].classList.add('is-active');
            dots[index].classList.add('is-active');
            document.querySelector('.pager').textContent = (index + 1) + '/' + items.length;
        });
    </script>
</body>
</html>"#;

/// Test server that serves the portal and viewer pages
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a new test server on a random available port
    pub async fn start() -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let index = warp::path::end().map(|| warp::reply::html(PORTAL_HTML));
        let viewer = warp::path("viewer").map(|| warp::reply::html(VIEWER_HTML));

        let routes = index.or(viewer);

        // Bind to random port
        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });

        tokio::spawn(server);

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this server (e.g., "http://127.0.0.1:12345")
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn viewer_url(&self) -> String {
        format!("{}/viewer", self.url())
    }

    /// Wait for the server to be ready by making a test request
    pub async fn wait_ready(&self) -> anyhow::Result<()> {
        let url = self.url();
        let max_attempts = 10;

        for attempt in 1..=max_attempts {
            match reqwest::get(&url).await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    println!("Attempt {}: server returned status {}", attempt, response.status());
                }
                Err(e) => {
                    println!("Attempt {}: server not ready - {}", attempt, e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        }

        anyhow::bail!(
            "Server did not become ready after {} attempts",
            max_attempts
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Signal server to shutdown
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
