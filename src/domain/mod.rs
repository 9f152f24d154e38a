// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// - 领域模型（models）：任务、抓取参数与结果、技能、模型配置
/// - 仓库接口（repositories）：数据持久化抽象接口
/// - 服务（services）：抓取、提取与 LLM 调用逻辑
pub mod models;
pub mod repositories;
pub mod services;
