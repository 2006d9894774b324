//! 1-based page cursor shared by the list views

/// Rows requested per page.
pub const PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    page: u32,
    /// `None` until the first page of results arrives.
    total_pages: Option<u32>,
}

impl Default for Pager {
    fn default() -> Self {
        Self {
            page: 1,
            total_pages: None,
        }
    }
}

impl Pager {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn set_total_pages(&mut self, total: u32) {
        self.total_pages = Some(total);
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Disabled only once the total is known and we are on or past it.
    pub fn has_next(&self) -> bool {
        match self.total_pages {
            Some(total) => self.page < total,
            None => true,
        }
    }

    /// Advance; returns false at the boundary.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.page += 1;
        true
    }

    pub fn prev(&mut self) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.page -= 1;
        true
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// "Page X of Y" with Y at least 1.
    pub fn label(&self) -> String {
        format!(
            "Page {} of {}",
            self.page,
            self.total_pages.unwrap_or(0).max(1)
        )
    }
}
