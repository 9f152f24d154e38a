// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 任务消息的投递、出队与确认：Redis 可靠列表实现和进程内实现
pub mod memory_queue;
pub mod task_queue;
