use serde::Deserialize;

use shared_models::response::Page;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn resolve(&self, default_limit: u32) -> Page {
        Page::new(self.page, self.limit, default_limit)
    }
}
