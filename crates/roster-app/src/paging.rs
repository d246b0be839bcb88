// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Client-side pagination. Everything here is derived from the item count,
//! the current page and the page size; none of it is stored.

use std::ops::Range;

use crate::{PAGE_SIZE, PAGE_WINDOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageView {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
}

impl PageView {
    pub const fn new(page: usize, total_items: usize) -> Self {
        Self {
            page,
            page_size: PAGE_SIZE,
            total_items,
        }
    }

    pub fn total_pages(self) -> usize {
        total_pages(self.total_items, self.page_size)
    }

    /// Index range into the item list for the current page. Empty when the
    /// page lies past the end.
    pub fn bounds(self) -> Range<usize> {
        let start = self
            .page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
            .min(self.total_items);
        let end = start.saturating_add(self.page_size).min(self.total_items);
        start..end
    }

    pub fn window(self) -> Vec<usize> {
        page_window(self.page, self.total_pages(), PAGE_WINDOW)
    }

    pub fn clamp(self, page: usize) -> usize {
        clamp_page(page, self.total_pages())
    }

    pub fn has_prev(self) -> bool {
        self.page > 1
    }

    pub fn has_next(self) -> bool {
        self.page < self.total_pages()
    }
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(page_size)
}

/// Clamps into `[1, total_pages]`; an empty list still has page 1.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

/// Up to `width` consecutive page numbers centred on `current`, shifted to
/// stay full width near either end.
pub fn page_window(current: usize, total_pages: usize, width: usize) -> Vec<usize> {
    if total_pages == 0 || width == 0 {
        return Vec::new();
    }
    let half = width / 2;
    let start = current.saturating_sub(half).max(1);
    let end = total_pages.min(start + width - 1);
    let start = (end + 1).saturating_sub(width).max(1);
    (start..=end).collect()
}
