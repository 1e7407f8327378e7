use serde::{Deserialize, Serialize};

/// Paging metadata.
///
/// `size` is the number of elements on this page. An empty result, page 0
/// or page size 0 all produce the all-zero descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub size: u64,
    pub number: u64,
    pub total_pages: u64,
    pub total_elements: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: PageInfo,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            page: PageInfo::default(),
        }
    }

    /// Cut page `number` (1-based) of `size` elements out of the full ordered result
    pub fn slice(items: Vec<T>, number: u32, size: u32) -> Self {
        if number == 0 || size == 0 || items.is_empty() {
            return Self::empty();
        }

        let total_elements = items.len() as u64;
        let size = u64::from(size);
        let total_pages = total_elements.div_ceil(size);
        let start = (u64::from(number) - 1).saturating_mul(size);

        let data: Vec<T> = items
            .into_iter()
            .skip(usize::try_from(start).unwrap_or(usize::MAX))
            .take(usize::try_from(size).unwrap_or(usize::MAX))
            .collect();

        Self {
            page: PageInfo {
                size: data.len() as u64,
                number: u64::from(number),
                total_pages,
                total_elements,
            },
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page() {
        let page = Page::slice((0..12).collect(), 1, 3);
        assert_eq!(page.data, vec![0, 1, 2]);
        assert_eq!(page.page.size, 3);
        assert_eq!(page.page.number, 1);
        assert_eq!(page.page.total_pages, 4);
        assert_eq!(page.page.total_elements, 12);
    }

    #[test]
    fn test_partial_last_page() {
        let page = Page::slice((0..10).collect(), 4, 3);
        assert_eq!(page.data, vec![9]);
        assert_eq!(page.page.size, 1);
        assert_eq!(page.page.total_pages, 4);
    }

    #[test]
    fn test_page_beyond_last() {
        let page = Page::slice((0..12).collect(), 9, 3);
        assert!(page.data.is_empty());
        assert_eq!(page.page.size, 0);
        assert_eq!(page.page.number, 9);
        assert_eq!(page.page.total_elements, 12);
        assert_eq!(page.page.total_pages, 4);
    }

    #[test]
    fn test_zero_descriptor() {
        let expected = PageInfo::default();
        assert_eq!(Page::<u8>::slice(Vec::new(), 1, 10).page, expected);
        assert_eq!(Page::slice(vec![1, 2, 3], 0, 10).page, expected);
        assert_eq!(Page::slice(vec![1, 2, 3], 1, 0).page, expected);
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(Page::slice(vec!["a"], 1, 10)).unwrap();
        assert_eq!(value["page"]["totalElements"], 1);
        assert_eq!(value["page"]["totalPages"], 1);
        assert_eq!(value["data"][0], "a");
    }
}
