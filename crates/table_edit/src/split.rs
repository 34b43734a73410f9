//! Split engine - divide merged cells back into rows
//!
//! Splitting targets a set of cells and a sub-count. A cell whose span
//! already reaches the sub-count is left alone. The others need rows:
//! the scheduler inserts spanned rows at the tightest end-of-span
//! boundary first, re-deriving the remaining needs after each insertion,
//! because one insertion can feed several overlapping spans at once.
//! After insertion, each target's span is cut into parts - evenly by
//! row count, or at evenly spaced height boundaries when `equal_height`
//! is requested.

use crate::editor::EditContext;
use crate::rows::insert_spanned_row;
use crate::Result;
use table_model::geometry::{cell_at_left_border, left_border_of};
use table_model::span::{master_of, renumber_spans, span_cells, span_extent, MAX_SPAN_WALK};
use table_model::{GridStore, HeightRule, NodeId, RowSpan};

/// Fallback row height (twips) when neither layout nor the row itself
/// knows one; 240 twips is one 12pt line.
const DEFAULT_ROW_HEIGHT: i64 = 240;

/// Split each target's span into `sub_count` parts.
///
/// Returns `Ok(false)` when nothing changed - every target's span
/// already reached the sub-count (splitting further would need column
/// operations, not row ones).
pub fn split_cells(
    store: &mut GridStore,
    table_id: NodeId,
    targets: &[NodeId],
    sub_count: u32,
    equal_height: bool,
    ctx: &mut EditContext,
) -> Result<bool> {
    if targets.is_empty() || sub_count < 2 {
        return Ok(false);
    }

    // Targets resolve to their span masters, deduplicated.
    let mut masters: Vec<NodeId> = Vec::new();
    for &target in targets {
        if store.row_index_of_cell(table_id, target).is_err() {
            return Ok(false);
        }
        let master = master_of(store, table_id, target, MAX_SPAN_WALK)?;
        if !masters.contains(&master) {
            masters.push(master);
        }
    }

    let mut affected = Vec::new();
    for &master in &masters {
        affected.extend(span_cells(store, table_id, master)?);
    }
    ctx.layout.discard_frames(table_id, &affected);

    let mut changed = false;
    if equal_height {
        for &master in &masters {
            changed |= split_equal_height(store, table_id, master, sub_count, ctx)?;
        }
    } else {
        // Phase 1: joint insertion schedule across all targets. Work on
        // the span with the smallest end-of-span boundary first and
        // insert exactly what it is missing; spans crossing that
        // boundary absorb the new rows, so their needs are re-derived
        // from the store on the next pass.
        let mut pending: Vec<NodeId> = Vec::new();
        for &master in &masters {
            let (top, bottom) = span_extent(store, table_id, master)?;
            if ((bottom - top + 1) as u32) < sub_count {
                pending.push(master);
            }
        }
        let to_redistribute = pending.clone();

        let mut guard = pending.len() * 2 + 2;
        while !pending.is_empty() && guard > 0 {
            guard -= 1;

            let mut best: Option<(usize, usize, u32)> = None;
            let mut satisfied: Vec<usize> = Vec::new();
            for (i, &master) in pending.iter().enumerate() {
                let (top, bottom) = span_extent(store, table_id, master)?;
                let have = (bottom - top + 1) as u32;
                if have >= sub_count {
                    satisfied.push(i);
                    continue;
                }
                let end = bottom + 1;
                let missing = sub_count - have;
                if best.map_or(true, |(_, e, _)| end < e) {
                    best = Some((i, end, missing));
                }
            }
            if !satisfied.is_empty() {
                // Dropping entries shifts indices; re-derive the best
                // candidate on the next pass.
                for i in satisfied.into_iter().rev() {
                    pending.remove(i);
                }
                continue;
            }
            let Some((i, end, missing)) = best else {
                break;
            };

            insert_spanned_row(store, table_id, end, missing as usize, ctx.content)?;
            changed = true;
            pending.remove(i);
        }

        // Phase 2: cut each processed span into parts, evenly by row
        // count - when over-insertion left more rows than parts, the
        // earlier parts absorb the remainder.
        for &master in &to_redistribute {
            changed |= redistribute(store, table_id, master, sub_count)?;
        }
    }

    renumber_spans(store, table_id)?;
    ctx.layout.rebuild_frames(table_id);
    Ok(changed)
}

/// Partition a span of `total` rows into `sub_count` parts: the first
/// `total % sub_count` parts take the extra row.
fn redistribute(
    store: &mut GridStore,
    table_id: NodeId,
    master: NodeId,
    sub_count: u32,
) -> Result<bool> {
    let (top, bottom) = span_extent(store, table_id, master)?;
    let total = bottom - top + 1;
    if total < sub_count as usize {
        tracing::warn!(%master, total, sub_count, "span still short after insertion; leaving as is");
        return Ok(false);
    }

    let x = left_border_of(store, master)?;
    let base = total / sub_count as usize;
    let remainder = total % sub_count as usize;

    let mut cursor = top;
    for part in 0..sub_count as usize {
        let size = base + usize::from(part < remainder);
        let row_id = store
            .table(table_id)?
            .row_at(cursor)
            .expect("partition stays inside the span");
        let Some(cell_id) = cell_at_left_border(store, row_id, x)? else {
            tracing::warn!(%master, cursor, "no cell at span border during redistribution");
            return Ok(true);
        };
        store.cell_mut(cell_id)?.row_span = RowSpan::master_of_height(size as u32);
        cursor += size;
    }
    Ok(true)
}

/// Equal-height split of one span: compute `sub_count - 1` evenly spaced
/// height boundaries over the span's rendered height, insert a spanned
/// row wherever a boundary falls inside a row, and assign the fragment
/// heights so the total is preserved. Parts are then delimited by the
/// boundaries rather than by row count.
fn split_equal_height(
    store: &mut GridStore,
    table_id: NodeId,
    master: NodeId,
    sub_count: u32,
    ctx: &mut EditContext,
) -> Result<bool> {
    let (top, bottom) = span_extent(store, table_id, master)?;
    if ((bottom - top + 1) as u32) >= sub_count {
        return Ok(false);
    }

    let total_height: i64 = (top..=bottom)
        .map(|r| row_height(store, table_id, r, ctx))
        .sum::<Result<i64>>()?;
    let tolerance = (total_height / 1000).max(1);

    // Part heights: remainder twips go to the earlier parts.
    let base = total_height / sub_count as i64;
    let remainder = total_height % sub_count as i64;
    let mut boundaries = Vec::with_capacity(sub_count as usize - 1);
    let mut acc = 0i64;
    for part in 0..(sub_count as i64 - 1) {
        acc += base + i64::from(part < remainder);
        boundaries.push(acc);
    }

    let mut changed = false;
    let mut span_bottom = bottom;
    for &boundary in &boundaries {
        // Walk the current span rows to find where the boundary lands.
        let mut acc = 0i64;
        let mut r = top;
        while r <= span_bottom {
            let height = row_height(store, table_id, r, ctx)?;
            if acc + height >= boundary - tolerance {
                break;
            }
            acc += height;
            r += 1;
        }
        let height = row_height(store, table_id, r, ctx)?;
        if (acc + height - boundary).abs() <= tolerance {
            continue; // boundary already aligns with a row edge
        }

        // Split row `r`: it keeps the part below the boundary line,
        // the inserted continuation row takes the rest.
        insert_spanned_row(store, table_id, r + 1, 1, ctx.content)?;
        changed = true;
        span_bottom += 1;

        let first_height = boundary - acc;
        let second_height = height - first_height;
        let row_id = store.table(table_id)?.row_at(r).expect("row in span");
        let new_row_id = store
            .table(table_id)?
            .row_at(r + 1)
            .expect("row just inserted");
        {
            let row = store.row_mut(row_id)?;
            row.height = Some(first_height);
            row.height_rule = HeightRule::Exact;
        }
        {
            let row = store.row_mut(new_row_id)?;
            row.height = Some(second_height);
            row.height_rule = HeightRule::Exact;
        }
    }

    // Cut the span at the boundaries: every part starts a fresh master.
    let x = left_border_of(store, master)?;
    let mut acc = 0i64;
    let mut next_boundary = 0usize;
    let mut part_start = top;
    for r in top..=span_bottom {
        acc += row_height(store, table_id, r, ctx)?;
        let at_boundary = next_boundary < boundaries.len()
            && (acc - boundaries[next_boundary]).abs() <= tolerance;
        let at_end = r == span_bottom;
        if !at_boundary && !at_end {
            continue;
        }
        if at_boundary {
            next_boundary += 1;
        }

        let size = r - part_start + 1;
        let row_id = store.table(table_id)?.row_at(part_start).expect("row in span");
        if let Some(cell_id) = cell_at_left_border(store, row_id, x)? {
            store.cell_mut(cell_id)?.row_span = RowSpan::master_of_height(size as u32);
            changed = true;
        }
        part_start = r + 1;
    }

    Ok(changed)
}

fn row_height(
    store: &GridStore,
    table_id: NodeId,
    row_index: usize,
    ctx: &EditContext,
) -> Result<i64> {
    let row_id = store
        .table(table_id)?
        .row_at(row_index)
        .ok_or_else(|| {
            crate::EditError::InvalidOperation(format!("row {row_index} out of range"))
        })?;
    if let Some(height) = ctx.layout.current_row_height(row_id) {
        return Ok(height);
    }
    Ok(store.row(row_id)?.height.unwrap_or(DEFAULT_ROW_HEIGHT))
}

// =============================================================================
// Tests
// =============================================================================
