// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 任务（task）：任务实体、状态和队列消息
/// - 抓取参数（scrape_params）：导航、拦截、交互与 AI 提取配置
/// - 抓取结果（scrape_outcome）：流水线的结构化输出
/// - 技能（skill）、模型配置与提取结果（llm）、节点（node）
pub mod llm;
pub mod node;
pub mod scrape_outcome;
pub mod scrape_params;
pub mod skill;
pub mod task;
