// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 进程内的 RESP 服务器
//!
//! 只实现队列与缓存用到的命令；阻塞命令与真实 Redis 一样在服务端等待

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Default)]
struct Keyspace {
    lists: HashMap<String, VecDeque<String>>,
    strings: HashMap<String, String>,
}

impl Keyspace {
    fn keys(&self) -> Vec<String> {
        self.lists.keys().chain(self.strings.keys()).cloned().collect()
    }

    fn pop(&mut self, key: &str, side: &str) -> Option<String> {
        let list = self.lists.get_mut(key)?;
        let value = if side.eq_ignore_ascii_case("LEFT") {
            list.pop_front()
        } else {
            list.pop_back()
        };
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }

    fn push(&mut self, key: &str, side: &str, value: String) {
        let list = self.lists.entry(key.to_string()).or_default();
        if side.eq_ignore_ascii_case("LEFT") {
            list.push_front(value);
        } else {
            list.push_back(value);
        }
    }

    fn lmove(&mut self, args: &[String]) -> Option<String> {
        let value = self.pop(&args[1], &args[3])?;
        self.push(&args[2], &args[4], value.clone());
        Some(value)
    }
}

enum Reply {
    Nil,
    Ok,
    Int(i64),
    Bulk(String),
    Array(Vec<Reply>),
}

impl Reply {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Nil => out.extend_from_slice(b"$-1\r\n"),
            Reply::Ok => out.extend_from_slice(b"+OK\r\n"),
            Reply::Int(n) => out.extend_from_slice(format!(":{}\r\n", n).as_bytes()),
            Reply::Bulk(s) => {
                out.extend_from_slice(format!("${}\r\n", s.len()).as_bytes());
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

/// 只支持末尾通配的 `prefix*` 模式
fn matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

/// 运行中的假 Redis
pub struct FakeRedis {
    addr: SocketAddr,
    data: Arc<Mutex<Keyspace>>,
    server: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let data = Arc::new(Mutex::new(Keyspace::default()));

        let shared = data.clone();
        let server = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, shared.clone()));
            }
        });

        Self { addr, data, server }
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    pub fn list_len(&self, key: &str) -> usize {
        self.data.lock().lists.get(key).map_or(0, VecDeque::len)
    }

    pub fn has_key(&self, key: &str) -> bool {
        let data = self.data.lock();
        data.lists.contains_key(key) || data.strings.contains_key(key)
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn read_command(reader: &mut BufReader<TcpStream>) -> Option<Vec<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        args.push(String::from_utf8(buf).ok()?);
    }
    Some(args)
}

async fn serve(stream: TcpStream, data: Arc<Mutex<Keyspace>>) {
    let mut reader = BufReader::new(stream);
    while let Some(args) = read_command(&mut reader).await {
        let reply = execute(&args, &data).await;
        let mut out = Vec::new();
        reply.encode(&mut out);
        if reader.get_mut().write_all(&out).await.is_err() {
            break;
        }
    }
}

async fn execute(args: &[String], data: &Mutex<Keyspace>) -> Reply {
    let name = args[0].to_ascii_uppercase();
    match name.as_str() {
        "LPUSH" | "RPUSH" => {
            let side = if name == "LPUSH" { "LEFT" } else { "RIGHT" };
            let mut data = data.lock();
            for value in &args[2..] {
                data.push(&args[1], side, value.clone());
            }
            Reply::Int(data.lists.get(&args[1]).map_or(0, |l| l.len() as i64))
        }
        "LMOVE" => data.lock().lmove(args).map_or(Reply::Nil, Reply::Bulk),
        "BLMOVE" => {
            let block = Duration::from_secs_f64(args[5].parse().unwrap_or(0.0));
            let deadline = Instant::now() + block;
            loop {
                let moved = data.lock().lmove(args);
                if let Some(value) = moved {
                    return Reply::Bulk(value);
                }
                if Instant::now() >= deadline {
                    return Reply::Nil;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }
        "LREM" => {
            let mut data = data.lock();
            let Some(list) = data.lists.get_mut(&args[1]) else {
                return Reply::Int(0);
            };
            match list.iter().position(|v| v == &args[3]) {
                Some(index) => {
                    list.remove(index);
                    Reply::Int(1)
                }
                None => Reply::Int(0),
            }
        }
        "GET" => data
            .lock()
            .strings
            .get(&args[1])
            .cloned()
            .map_or(Reply::Nil, Reply::Bulk),
        "SETEX" => {
            data.lock().strings.insert(args[1].clone(), args[3].clone());
            Reply::Ok
        }
        "DEL" => {
            let mut data = data.lock();
            let removed = args[1..]
                .iter()
                .filter(|key| data.strings.remove(*key).is_some() || data.lists.remove(*key).is_some())
                .count();
            Reply::Int(removed as i64)
        }
        "SCAN" => {
            let pattern = args
                .iter()
                .position(|a| a.eq_ignore_ascii_case("MATCH"))
                .and_then(|i| args.get(i + 1))
                .map_or("*", String::as_str);
            let keys = data
                .lock()
                .keys()
                .into_iter()
                .filter(|key| matches(pattern, key))
                .map(Reply::Bulk)
                .collect();
            Reply::Array(vec![Reply::Bulk("0".into()), Reply::Array(keys)])
        }
        // CLIENT SETINFO 等握手命令
        _ => Reply::Ok,
    }
}
