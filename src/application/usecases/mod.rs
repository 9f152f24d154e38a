// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用用例模块
///
/// 任务提交：创建、投递、同步等待、重试与批量提交
pub mod submit_task;
