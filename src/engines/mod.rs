// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 抓取引擎模块
///
/// - 浏览器资源管理（browser_manager）：浏览器进程与隔离上下文
/// - 抓取流水线（browser_engine）：导航、等待、交互、截图与结果组装
/// - 请求拦截（interception）、技能（skills）、视觉提取（visual_extractor）
pub mod browser_engine;
pub mod browser_manager;
pub mod interception;
pub mod skills;
pub mod traits;
pub mod visual_extractor;
