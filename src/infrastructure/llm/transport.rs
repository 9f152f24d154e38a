// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::LlmError;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

/// 供应商共用的 HTTP 传输
///
/// 统一超时、非 2xx 状态和流式响应的分行处理
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout_secs: u64,
}

impl HttpTransport {
    /// 创建传输层
    ///
    /// # 参数
    ///
    /// * `timeout_secs` - 单次请求的总超时
    pub fn new(timeout_secs: u64) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 发送请求并把响应体解析为 JSON
    pub async fn send_json(&self, request: RequestBuilder) -> Result<Value, LlmError> {
        let response = self.send(request).await?;
        response.json::<Value>().await.map_err(|e| self.map_error(e))
    }

    /// 发送流式请求，对每个完整的行调用 `on_line`
    ///
    /// 行尾的 `\r` 会被去掉，空行会被跳过
    pub async fn send_lines<F>(&self, request: RequestBuilder, mut on_line: F) -> Result<(), LlmError>
    where
        F: FnMut(&str) -> Result<(), LlmError>,
    {
        let response = self.send(request).await?;
        let mut stream = response.bytes_stream();
        let mut buffer = BytesMut::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_error(e))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line = buffer.split_to(pos + 1);
                emit_line(&line[..pos], &mut on_line)?;
            }
        }

        if !buffer.is_empty() {
            emit_line(&buffer, &mut on_line)?;
        }
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, LlmError> {
        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn map_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::Http(err)
        }
    }
}

fn emit_line<F>(raw: &[u8], on_line: &mut F) -> Result<(), LlmError>
where
    F: FnMut(&str) -> Result<(), LlmError>,
{
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Ok(());
    }
    on_line(line)
}

/// 取出 SSE `data:` 行的负载，`[DONE]` 和其他字段返回 `None`
pub fn sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        None
    } else {
        Some(data)
    }
}

/// 解析一行流式 JSON
pub fn parse_event(data: &str) -> Result<Value, LlmError> {
    serde_json::from_str(data)
        .map_err(|e| LlmError::InvalidResponse(format!("bad stream event: {}", e)))
}

/// 读取 JSON 中的非负整数，缺失时为 0
pub fn count(value: &Value) -> u64 {
    value.as_u64().unwrap_or(0)
}
