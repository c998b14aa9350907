use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
// Garante que (page - 1) * limit cabe em i64
const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// `?page=&limit=` comuns a todas as listagens.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Página (começa em 1)
    pub page: Option<i64>,
    /// Itens por página (máximo 100)
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: &PageParams, total: i64) -> Self {
        Self {
            items,
            page: params.page(),
            limit: params.limit(),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn limit_is_bounded() {
        let params = PageParams { page: Some(3), limit: Some(1_000) };
        assert_eq!(params.limit(), MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 200);

        let params = PageParams { page: Some(0), limit: Some(0) };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 1);
    }

    #[test]
    fn huge_pages_do_not_overflow_the_offset() {
        let params = PageParams { page: Some(i64::MAX), limit: Some(MAX_PAGE_SIZE) };
        assert_eq!(params.page(), MAX_PAGE);
        assert!(params.offset() >= 0);
        assert_eq!(params.offset(), (MAX_PAGE - 1) * MAX_PAGE_SIZE);

        let params = PageParams { page: Some(i64::MIN), limit: Some(i64::MIN) };
        assert_eq!(params.offset(), 0);
    }
}
