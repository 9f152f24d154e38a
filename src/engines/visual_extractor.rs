// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_outcome::BLOCK_SEPARATOR;
use crate::engines::browser_engine::evaluate;
use crate::engines::traits::EngineError;
use chromiumoxide::Page;
use serde::Deserialize;
use serde_json::json;

/// 纵向距离小于该值的记录视为同一行
const SAME_LINE_PX: i64 = 10;
/// 与块首记录纵向距离超过该值时开启新块
const BLOCK_GAP_PX: i64 = 15;

/// 视觉提取失败时写入结果的文本
pub const EXTRACTION_FAILED_TEXT: &str = "Failed to extract visual content";

/// 页面上一个可见的文本叶子节点
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeafRecord {
    pub tag: String,
    pub text: String,
    pub x: i64,
    pub y: i64,
}

/// 提取页面的视觉文本
///
/// 有容器选择器时每个匹配的容器单独遍历，结果以分隔行连接；
/// 没有容器或容器都不存在时遍历整个 body
///
/// # 参数
///
/// * `page` - 已渲染的页面
/// * `containers` - 容器选择器
/// * `excludes` - 排除选择器，命中节点及其后代都会被跳过
pub async fn extract(page: &Page, containers: &[String], excludes: &[String]) -> Result<String, EngineError> {
    let script = format!("({})({}, {})", COLLECT_JS, json!(containers), json!(excludes));
    let raw = evaluate(page, &script).await?;
    let groups: Vec<Vec<LeafRecord>> =
        serde_json::from_value(raw).map_err(|e| EngineError::Script(e.to_string()))?;
    Ok(format_containers(groups))
}

/// 把每个容器的记录分别排版后用分隔行连接，空容器被忽略
pub fn format_containers(groups: Vec<Vec<LeafRecord>>) -> String {
    groups
        .into_iter()
        .map(format_records)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// 按视觉顺序排版一组叶子记录
///
/// 先按纵坐标分行，纵向相差不足 10px 的记录在行内按横坐标排序；
/// 再从块首记录起，纵向距离不超过 15px 的记录并入同一块。
/// 块内文本以 ` | ` 连接，块之间换行
pub fn format_records(mut records: Vec<LeafRecord>) -> String {
    records.retain(|r| !r.text.trim().is_empty());
    records.sort_by_key(|r| (r.y, r.x));

    let mut ordered: Vec<LeafRecord> = Vec::with_capacity(records.len());
    let mut line: Vec<LeafRecord> = Vec::new();
    for record in records {
        if line.first().is_some_and(|first| record.y - first.y >= SAME_LINE_PX) {
            line.sort_by_key(|r| r.x);
            ordered.append(&mut line);
        }
        line.push(record);
    }
    line.sort_by_key(|r| r.x);
    ordered.append(&mut line);

    let mut blocks: Vec<(i64, Vec<String>)> = Vec::new();
    for record in ordered {
        match blocks.last_mut() {
            Some((start_y, texts)) if (record.y - *start_y).abs() <= BLOCK_GAP_PX => {
                texts.push(record.text);
            }
            _ => blocks.push((record.y, vec![record.text])),
        }
    }

    blocks
        .into_iter()
        .map(|(_, texts)| texts.join(" | "))
        .collect::<Vec<_>>()
        .join("\n")
}

const COLLECT_JS: &str = r#"(containerSelectors, excludeSelectors) => {
    const SKIP_TAGS = ['script', 'style', 'noscript', 'iframe', 'svg'];
    const LEAF_TAGS = ['button', 'input', 'select', 'textarea', 'a'];

    const excluded = (node) => excludeSelectors.some((sel) => {
        try { return node.closest(sel) !== null; } catch (e) { return false; }
    });

    const collect = (root) => {
        const records = [];
        const walk = (node) => {
            if (node.nodeType === Node.ELEMENT_NODE) {
                const style = window.getComputedStyle(node);
                if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return;
                const tag = node.tagName.toLowerCase();
                if (SKIP_TAGS.includes(tag)) return;
                if (excluded(node)) return;

                const hasText = Array.from(node.childNodes).some(
                    (c) => c.nodeType === Node.TEXT_NODE && c.textContent.trim()
                );
                if (hasText || LEAF_TAGS.includes(tag)) {
                    const rect = node.getBoundingClientRect();
                    if (rect.width > 0 && rect.height > 0) {
                        let text = (node.innerText || node.value || '').trim().replace(/\n+/g, ' ');
                        if (tag === 'a' && node.href) {
                            text = text ? `${text} [Link: ${node.href}]` : `[Link: ${node.href}]`;
                        }
                        records.push({ tag, text, x: Math.round(rect.x), y: Math.round(rect.y) });
                        return;
                    }
                }
            }
            for (const child of node.childNodes) walk(child);
        };
        walk(root);
        return records;
    };

    let roots = [];
    for (const sel of containerSelectors) {
        try { roots.push(...document.querySelectorAll(sel)); } catch (e) {}
    }
    if (roots.length === 0 && document.body) roots = [document.body];
    return roots.map(collect);
}"#;
