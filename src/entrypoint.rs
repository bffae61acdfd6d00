//! HTTP entrypoint — runs the pipeline and answers with its decision
//!
//! This listener only exercises the filter chain: forwarded requests are
//! answered with the routing decision in headers, rejections are answered
//! as mapped by the stages. Proxying to upstreams is out of scope.

use crate::context::{resolve_client_ip, RequestContext};
use crate::error::Result;
use crate::filter::{reject_response, FilterChain, PipelineVerdict};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind the listener and serve until ctrl-c
pub async fn serve(listen: &str, chain: Arc<FilterChain>) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;
    tracing::info!(address = listen, stages = chain.len(), "Pipeline listening");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                return Ok(());
            }
        };

        let chain = chain.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle_request(req, chain.clone(), peer));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, "Connection error");
            }
        });
    }
}

/// Run one request through the chain and build the response
async fn handle_request(
    req: hyper::Request<Incoming>,
    chain: Arc<FilterChain>,
    peer: SocketAddr,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (parts, _body) = req.into_parts();
    let client_ip = resolve_client_ip(&parts.headers, &peer.ip().to_string());

    let mut ctx = RequestContext::new(
        parts.method.clone(),
        parts.uri.path().to_string(),
        parts.uri.query().map(str::to_string),
        client_ip,
        parts.headers,
    );

    let response = match chain.execute(&mut ctx).await {
        PipelineVerdict::Forward { target } => {
            let mut builder = hyper::Response::builder()
                .status(200)
                .header("content-type", "application/json")
                .header("x-upstream-group", target.group());

            if let Some(id) = &ctx.request_id {
                builder = builder.header("x-request-id", id);
            }
            if let Some(id) = &ctx.trace_id {
                builder = builder.header("x-trace-id", id);
            }
            if let crate::context::RouteTarget::Gray {
                version: Some(version),
            } = &target
            {
                builder = builder.header("x-gray-version", version);
            }
            for (name, value) in &ctx.response_headers {
                builder = builder.header(*name, value);
            }

            let body = format!(r#"{{"forward":"{}"}}"#, target.group());
            builder
                .body(Full::new(Bytes::from(body)))
                .unwrap_or_else(|_| hyper::Response::new(Full::new(Bytes::new())))
        }
        PipelineVerdict::Reject {
            status,
            reason,
            headers,
        } => {
            let (parts, body) = reject_response(&ctx, status, &reason, &headers).into_parts();
            hyper::Response::from_parts(parts, Full::new(Bytes::from(body)))
        }
    };

    Ok(response)
}
