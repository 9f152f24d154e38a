// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_params::InteractionStep;
use crate::domain::models::skill::SkillDefinition;
use crate::domain::repositories::skill_repository::SkillRepository;
use crate::engines::browser_engine::{evaluate, wait_for_network_idle};
use crate::engines::traits::EngineError;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::Page;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const NEXT_KEYWORDS: &[&str] = &["下一页", "Next", ">", "next page", "»"];
const PREV_KEYWORDS: &[&str] = &["上一页", "Prev", "<", "prev page", "«"];

const PAGINATION_SETTLE_TIMEOUT: Duration = Duration::from_millis(5000);

/// 内置技能
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinSkill {
    Scroll,
    InfiniteScroll,
    Pagination,
    Zoom,
    Fill,
    Click,
    Wait,
    ExtractCoordinates,
}

impl BuiltinSkill {
    pub const ALL: [BuiltinSkill; 8] = [
        BuiltinSkill::Scroll,
        BuiltinSkill::InfiniteScroll,
        BuiltinSkill::Pagination,
        BuiltinSkill::Zoom,
        BuiltinSkill::Fill,
        BuiltinSkill::Click,
        BuiltinSkill::Wait,
        BuiltinSkill::ExtractCoordinates,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinSkill::Scroll => "scroll",
            BuiltinSkill::InfiniteScroll => "infinite_scroll",
            BuiltinSkill::Pagination => "pagination",
            BuiltinSkill::Zoom => "zoom",
            BuiltinSkill::Fill => "fill",
            BuiltinSkill::Click => "click",
            BuiltinSkill::Wait => "wait",
            BuiltinSkill::ExtractCoordinates => "extract_coordinates",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BuiltinSkill::Scroll => "scrolled the page or a container by a fixed distance",
            BuiltinSkill::InfiniteScroll => {
                "scrolled repeatedly until no more content was loaded"
            }
            BuiltinSkill::Pagination => "moved to the next or previous result page",
            BuiltinSkill::Zoom => "zoomed a map view in or out",
            BuiltinSkill::Fill => "filled form fields",
            BuiltinSkill::Click => "clicked an element",
            BuiltinSkill::Wait => "waited for the page to settle",
            BuiltinSkill::ExtractCoordinates => {
                "extracted map coordinates (latitude, longitude) from the page"
            }
        }
    }
}

impl fmt::Display for BuiltinSkill {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinSkill {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinSkill::ALL
            .into_iter()
            .find(|skill| skill.name() == s)
            .ok_or(())
    }
}

/// 解析后的技能
#[derive(Debug, Clone, PartialEq)]
pub enum Skill {
    Builtin(BuiltinSkill),
    /// 来自技能库、以脚本体执行的技能
    Dynamic(SkillDefinition),
}

impl Skill {
    pub fn name(&self) -> &str {
        match self {
            Skill::Builtin(builtin) => builtin.name(),
            Skill::Dynamic(definition) => &definition.name,
        }
    }

    /// 供提示词使用的一行描述
    pub fn describe(&self) -> String {
        match self {
            Skill::Builtin(builtin) => format!("{}: {}", builtin.name(), builtin.description()),
            Skill::Dynamic(definition) if definition.description.trim().is_empty() => {
                format!("{}: {}", definition.name, definition.display_name)
            }
            Skill::Dynamic(definition) => {
                format!("{}: {}", definition.name, definition.description)
            }
        }
    }
}

/// 技能执行引擎
///
/// 先查内置技能表，未命中再按名称从技能库加载
#[derive(Clone)]
pub struct SkillEngine {
    store: Arc<dyn SkillRepository>,
}

impl SkillEngine {
    pub fn new(store: Arc<dyn SkillRepository>) -> Self {
        Self { store }
    }

    /// 按名称解析技能
    ///
    /// 技能库出错时视为未找到
    pub async fn resolve(&self, name: &str) -> Option<Skill> {
        if let Ok(builtin) = name.parse::<BuiltinSkill>() {
            return Some(Skill::Builtin(builtin));
        }
        match self.store.find_enabled_by_name(name).await {
            Ok(definition) => definition.map(Skill::Dynamic),
            Err(e) => {
                warn!("Skill store lookup failed for {}: {}", name, e);
                None
            }
        }
    }

    /// 按顺序执行交互步骤
    ///
    /// 单步失败只记录日志，不影响后续步骤。非布尔、非空的返回值
    /// 以 `{action}_{index}` 为键收集
    ///
    /// # 参数
    ///
    /// * `page` - 目标页面
    /// * `steps` - 交互步骤列表
    pub async fn run_steps(&self, page: &Page, steps: &[InteractionStep]) -> BTreeMap<String, Value> {
        let mut results = BTreeMap::new();
        if steps.is_empty() {
            return results;
        }
        info!("Executing {} interaction steps", steps.len());

        for (index, step) in steps.iter().enumerate() {
            if step.is_scoping() {
                continue;
            }
            let Some(skill) = self.resolve(&step.action).await else {
                warn!("Unknown skill action: {}", step.action);
                continue;
            };

            debug!("Executing skill {} with params {:?}", step.action, step.params);
            match run_skill(page, &skill, &step.params).await {
                Ok(Value::Null) | Ok(Value::Bool(_)) => {}
                Ok(value) => {
                    results.insert(format!("{}_{}", step.action, index), value);
                }
                Err(e) => error!("Skill {} failed: {}", step.action, e),
            }
        }

        results
    }

    /// 步骤中已解析技能的描述，跳过范围限定步骤
    pub async fn describe(&self, steps: &[InteractionStep]) -> Vec<String> {
        let mut descriptions = Vec::new();
        for step in steps.iter().filter(|step| !step.is_scoping()) {
            if let Some(skill) = self.resolve(&step.action).await {
                let line = skill.describe();
                if !descriptions.contains(&line) {
                    descriptions.push(line);
                }
            }
        }
        descriptions
    }
}

async fn run_skill(page: &Page, skill: &Skill, params: &Map<String, Value>) -> Result<Value, EngineError> {
    match skill {
        Skill::Builtin(BuiltinSkill::Scroll) => scroll(page, params).await,
        Skill::Builtin(BuiltinSkill::InfiniteScroll) => infinite_scroll(page, params).await,
        Skill::Builtin(BuiltinSkill::Pagination) => pagination(page, params).await,
        Skill::Builtin(BuiltinSkill::Zoom) => zoom(page, params).await,
        Skill::Builtin(BuiltinSkill::Fill) => fill(page, params).await,
        Skill::Builtin(BuiltinSkill::Click) => {
            let selector = str_param(params, "selector")
                .ok_or_else(|| EngineError::Script("click requires a selector".into()))?;
            page.find_element(selector).await?.click().await?;
            Ok(Value::Bool(true))
        }
        Skill::Builtin(BuiltinSkill::Wait) => {
            tokio::time::sleep(Duration::from_millis(u64_param(params, "duration", 1000))).await;
            Ok(Value::Bool(true))
        }
        Skill::Builtin(BuiltinSkill::ExtractCoordinates) => {
            let coords = evaluate(page, EXTRACT_COORDINATES_JS).await?;
            if !coords.is_null() {
                info!("Extracted coordinates: {}", coords);
            }
            Ok(coords)
        }
        Skill::Dynamic(definition) => {
            let mut merged = schema_defaults(&definition.params_schema);
            merged.extend(params.clone());
            evaluate(page, &dynamic_script(&definition.script, &Value::Object(merged))).await
        }
    }
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn u64_param(params: &Map<String, Value>, key: &str, default: u64) -> u64 {
    params.get(key).and_then(Value::as_u64).unwrap_or(default)
}

fn i64_param(params: &Map<String, Value>, key: &str, default: i64) -> i64 {
    params.get(key).and_then(Value::as_i64).unwrap_or(default)
}

/// 参数声明中的默认值
///
/// 字段为带 `default` 的对象时取 `default`，为普通值时直接取该值
pub fn schema_defaults(schema: &Value) -> Map<String, Value> {
    let Some(fields) = schema.as_object() else {
        return Map::new();
    };
    fields
        .iter()
        .filter_map(|(key, spec)| match spec {
            Value::Object(obj) => obj.get("default").map(|d| (key.clone(), d.clone())),
            Value::Null => None,
            plain => Some((key.clone(), plain.clone())),
        })
        .collect()
}

/// 把脚本体包装为以 `params` 调用的异步函数
pub fn dynamic_script(body: &str, params: &Value) -> String {
    format!("(async (params) => {{\n{}\n}})({})", body, params)
}

fn scroll_target(selector: &str) -> String {
    if selector == "window" {
        "document.scrollingElement || document.documentElement".to_string()
    } else {
        format!("document.querySelector({})", json!(selector))
    }
}

async fn scroll(page: &Page, params: &Map<String, Value>) -> Result<Value, EngineError> {
    let selector = str_param(params, "selector").unwrap_or("window");
    let distance = i64_param(params, "distance", 500);
    let script = format!(
        "(() => {{ const el = {}; if (el) {{ el.scrollTop += {}; }} return true; }})()",
        scroll_target(selector),
        distance
    );
    evaluate(page, &script).await?;
    tokio::time::sleep(Duration::from_millis(u64_param(params, "delay", 1000))).await;
    Ok(Value::Bool(true))
}

async fn infinite_scroll(page: &Page, params: &Map<String, Value>) -> Result<Value, EngineError> {
    let selector = str_param(params, "selector").unwrap_or("window");
    let max_scrolls = u64_param(params, "max_scrolls", 10);
    let delay = Duration::from_millis(u64_param(params, "delay", 1500));
    let target = scroll_target(selector);
    let height = format!("(() => {{ const el = {}; return el ? el.scrollHeight : 0; }})()", target);
    let to_bottom = format!(
        "(() => {{ const el = {}; if (el) {{ el.scrollTop = el.scrollHeight; }} return true; }})()",
        target
    );

    let mut scrolls = 0;
    while scrolls < max_scrolls {
        let before = evaluate(page, &height).await?;
        evaluate(page, &to_bottom).await?;
        tokio::time::sleep(delay).await;
        let after = evaluate(page, &height).await?;

        if after == before {
            info!("Infinite scroll reached end at {} scrolls", scrolls);
            break;
        }
        scrolls += 1;
        debug!("Infinite scroll progressed: {}/{}", scrolls, max_scrolls);
    }
    Ok(Value::Bool(true))
}

/// 翻页方向对应的关键词
pub fn pagination_keywords(action: &str) -> &'static [&'static str] {
    if action == "prev" {
        PREV_KEYWORDS
    } else {
        NEXT_KEYWORDS
    }
}

async fn pagination(page: &Page, params: &Map<String, Value>) -> Result<Value, EngineError> {
    let clicked = match str_param(params, "selector") {
        Some(selector) => {
            page.find_element(selector).await?.click().await?;
            true
        }
        None => {
            let action = str_param(params, "action").unwrap_or("next");
            let script = format!(
                "({})({})",
                CLICK_BY_KEYWORD_JS,
                json!(pagination_keywords(action))
            );
            evaluate(page, &script).await?.as_bool().unwrap_or(false)
        }
    };

    if !clicked {
        warn!("Pagination control not found");
    }
    wait_for_network_idle(page, PAGINATION_SETTLE_TIMEOUT).await;
    Ok(Value::Bool(clicked))
}

async fn zoom(page: &Page, params: &Map<String, Value>) -> Result<Value, EngineError> {
    if let Some(selector) = str_param(params, "selector") {
        page.find_element(selector).await?.hover().await?;
    }
    let key = if str_param(params, "direction") == Some("out") {
        "-"
    } else {
        "+"
    };

    for _ in 0..u64_param(params, "times", 1) {
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder().r#type(kind.clone()).key(key);
            if kind == DispatchKeyEventType::KeyDown {
                builder = builder.text(key);
            }
            let event = builder.build().map_err(EngineError::Script)?;
            page.execute(event).await?;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Ok(Value::Bool(true))
}

async fn fill(page: &Page, params: &Map<String, Value>) -> Result<Value, EngineError> {
    let Some(Value::Object(data)) = params.get("data") else {
        return Err(EngineError::Script("fill requires a data object".into()));
    };
    for (selector, value) in data {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let element = page.find_element(selector.as_str()).await?;
        element
            .call_js_fn("function() { if ('value' in this) { this.value = ''; } }", false)
            .await?;
        element.click().await?.type_str(text).await?;
    }
    Ok(Value::Bool(true))
}

const CLICK_BY_KEYWORD_JS: &str = r#"(keywords) => {
    const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    const label = (el) => ((el.innerText || '') + ' ' + (el.getAttribute('aria-label') || '')).trim().toLowerCase();
    const controls = Array.from(document.querySelectorAll('button, [role="button"], a, [role="link"]')).filter(visible);
    for (const kw of keywords) {
        const needle = kw.toLowerCase();
        const hit = controls.find((el) => label(el).includes(needle));
        if (hit) { hit.click(); return true; }
    }
    const all = Array.from(document.querySelectorAll('body *')).filter(visible);
    for (const kw of keywords) {
        const hit = all.find((el) => el.children.length === 0 && (el.innerText || '').trim() === kw);
        if (hit) { hit.click(); return true; }
    }
    return false;
}"#;

const EXTRACT_COORDINATES_JS: &str = r#"(() => {
    const results = [];
    const coordRegex = /(ll|query|@)=([-+]?\d+\.\d+),([-+]?\d+\.\d+)/;
    const altRegex = /@([-+]?\d+\.\d+),([-+]?\d+\.\d+)/;
    const mapsRegex = /google\.[a-z.]+\/maps/;

    const scan = (root, isDocument) => {
        for (const link of Array.from(root.querySelectorAll('a')).filter((a) => mapsRegex.test(a.href))) {
            let m = link.href.match(coordRegex);
            if (m) { results.push({ lat: m[2], lng: m[3], url: link.href }); continue; }
            m = link.href.match(altRegex);
            if (m) { results.push({ lat: m[1], lng: m[2], url: link.href }); }
        }
        if (isDocument) {
            const meta = root.querySelector('meta[name="geo.position"]');
            if (meta) {
                const parts = meta.content.split(';');
                if (parts.length === 2) results.push({ lat: parts[0], lng: parts[1], source: 'meta' });
            }
            for (const s of root.querySelectorAll('script[type="application/ld+json"]')) {
                try {
                    const data = JSON.parse(s.textContent);
                    if (data.geo && data.geo.latitude && data.geo.longitude) {
                        results.push({ lat: data.geo.latitude, lng: data.geo.longitude, source: 'ld+json' });
                    }
                } catch (e) {}
            }
        }
        for (const el of root.querySelectorAll('*')) {
            if (el.shadowRoot) scan(el.shadowRoot, false);
        }
    };

    scan(document, true);
    if (results.length === 0) {
        for (const frame of document.querySelectorAll('iframe')) {
            try {
                if (frame.contentDocument) scan(frame.contentDocument, true);
            } catch (e) {}
            if (results.length > 0) break;
        }
    }
    return results.length > 0 ? results[0] : null;
})()"#;
