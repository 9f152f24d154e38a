// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理工作节点的配置设置，包括数据库、Redis、浏览器、LLM 等配置
pub mod settings;
