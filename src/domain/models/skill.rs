// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// 技能类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Interaction,
    Extraction,
}

impl fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkillCategory::Interaction => write!(f, "interaction"),
            SkillCategory::Extraction => write!(f, "extraction"),
        }
    }
}

impl FromStr for SkillCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interaction" => Ok(SkillCategory::Interaction),
            "extraction" => Ok(SkillCategory::Extraction),
            _ => Err(()),
        }
    }
}

/// 技能定义
///
/// 内置技能在进程启动时固定，其余由技能库按名称解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// 唯一名称
    pub name: String,
    pub display_name: String,
    pub category: SkillCategory,
    pub description: String,
    /// 脚本体，执行时以 `params` 为参数调用
    pub script: String,
    /// 参数声明
    pub params_schema: Value,
    pub is_enabled: bool,
    pub is_builtin: bool,
}
