// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 只影响 AI 提取、不影响页面渲染的参数名
///
/// 计算渲染缓存键时会剔除这些字段
pub const AI_PARAM_KEYS: &[&str] = &[
    "agent_enabled",
    "agent_model_id",
    "agent_prompt",
    "agent_system_prompt",
    "agent_parallel_enabled",
    "agent_parallel_batch_size",
];

/// 限定视觉提取范围的步骤名
pub const BLOCK_CONTAINER_ACTION: &str = "block_container";
/// 排除元素的步骤名
pub const EXCLUDE_ELEMENTS_ACTION: &str = "exclude_elements";

/// 导航等待策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// 等待 load 事件
    Load,
    /// 等待 DOMContentLoaded
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// 等待网络空闲
    #[default]
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WaitUntil::Load => write!(f, "load"),
            WaitUntil::DomContentLoaded => write!(f, "domcontentloaded"),
            WaitUntil::NetworkIdle => write!(f, "networkidle"),
        }
    }
}

impl FromStr for WaitUntil {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load" => Ok(WaitUntil::Load),
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "networkidle" => Ok(WaitUntil::NetworkIdle),
            _ => Err(()),
        }
    }
}

/// 视口尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// 代理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// 代理地址，例如 `http://host:port`
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 单个交互步骤
///
/// 按列表顺序依次执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionStep {
    /// 技能名
    pub action: String,
    /// 技能参数
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl InteractionStep {
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            action: action.into(),
            params,
        }
    }

    /// 是否为只影响视觉提取范围的步骤
    pub fn is_scoping(&self) -> bool {
        self.action == BLOCK_CONTAINER_ACTION || self.action == EXCLUDE_ELEMENTS_ACTION
    }

    /// 读取 `selector` 或 `selectors` 参数
    pub fn selectors(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(Value::String(s)) = self.params.get("selector") {
            if !s.trim().is_empty() {
                out.push(s.clone());
            }
        }
        if let Some(Value::Array(items)) = self.params.get("selectors") {
            out.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string),
            );
        }
        out
    }
}

/// 抓取参数
///
/// 涵盖导航、拦截、交互和 AI 提取配置，缺省字段取默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeParams {
    /// 导航等待策略
    pub wait_for: WaitUntil,
    /// 导航后等待出现的 CSS 选择器
    pub wait_for_selector: Option<String>,
    /// 额外等待时间（毫秒）
    pub wait_time: u64,
    /// 导航超时（毫秒）
    pub timeout: u64,
    /// 是否截图
    pub screenshot: bool,
    /// 是否整页截图
    pub is_fullscreen: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub proxy: Option<ProxyConfig>,
    /// 是否注入反检测脚本
    pub stealth: bool,
    /// 屏蔽图片
    pub block_images: bool,
    /// 屏蔽媒体、字体和样式表
    pub block_media: bool,
    /// 需要捕获的接口 URL 通配模式
    pub intercept_apis: Vec<String>,
    /// 捕获后是否放行请求
    pub intercept_continue: bool,
    pub interaction_steps: Vec<InteractionStep>,
    pub agent_enabled: bool,
    pub agent_model_id: Option<String>,
    pub agent_prompt: Option<String>,
    pub agent_system_prompt: Option<String>,
    pub agent_parallel_enabled: bool,
    pub agent_parallel_batch_size: usize,
}

impl Default for ScrapeParams {
    fn default() -> Self {
        Self {
            wait_for: WaitUntil::NetworkIdle,
            wait_for_selector: None,
            wait_time: 3000,
            timeout: 30_000,
            screenshot: false,
            is_fullscreen: false,
            viewport: Viewport::default(),
            user_agent: None,
            proxy: None,
            stealth: true,
            block_images: false,
            block_media: false,
            intercept_apis: Vec::new(),
            intercept_continue: false,
            interaction_steps: Vec::new(),
            agent_enabled: false,
            agent_model_id: None,
            agent_prompt: None,
            agent_system_prompt: None,
            agent_parallel_enabled: false,
            agent_parallel_batch_size: 50,
        }
    }
}

impl ScrapeParams {
    /// 是否需要执行 AI 提取
    pub fn agent_requested(&self) -> bool {
        self.agent_enabled
            && self
                .agent_model_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty())
    }

    /// `block_container` 步骤声明的容器选择器
    pub fn container_selectors(&self) -> Vec<String> {
        self.scoping_selectors(BLOCK_CONTAINER_ACTION)
    }

    /// `exclude_elements` 步骤声明的排除选择器
    pub fn exclude_selectors(&self) -> Vec<String> {
        self.scoping_selectors(EXCLUDE_ELEMENTS_ACTION)
    }

    fn scoping_selectors(&self, action: &str) -> Vec<String> {
        self.interaction_steps
            .iter()
            .filter(|step| step.action == action)
            .flat_map(InteractionStep::selectors)
            .collect()
    }

    /// 剔除 AI 字段后的渲染参数
    pub fn render_fields(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            for key in AI_PARAM_KEYS {
                map.remove(*key);
            }
        }
        value
    }
}
