// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 抓取服务（scrape_service）：抓取引擎之上的渲染缓存与 AI 提取
/// - 提取服务（extraction_service）：模型解析、提取缓存与分块并行提取
/// - LLM服务（llm_service）：提示词构造、结果解析与重试
pub mod extraction_service;
pub mod llm_service;
pub mod scrape_service;
