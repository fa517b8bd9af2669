use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub next_offset: i64,
    pub prev_offset: i64,
    pub page_list: Vec<(String, i64)>,
    pub message: Option<String>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        if rows.is_empty() || total_rows <= 0 {
            return Self::no_rows();
        }
        let last_offset = ((total_rows - 1) / page_size) * page_size;
        let next_offset = (current_offset + page_size).min(last_offset);
        let prev_offset = (current_offset - page_size).max(0);

        let page_count = ((total_rows + page_size - 1) / page_size) as usize;
        let current_page = (current_offset / page_size) as usize;

        let page_list = (0..page_count)
            .map(|n| {
                let page = if n == current_page {
                    String::from("...")
                } else {
                    format!("{}", n + 1)
                };

                (page, (n as i64) * page_size)
            })
            .collect();

        Self {
            rows,
            total_rows,
            next_offset,
            prev_offset,
            page_list,
            message: Some(format!(
                "{} - {} / {}",
                current_offset,
                (current_offset + page_size).min(total_rows),
                total_rows
            )),
        }
    }

    pub fn no_rows() -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            next_offset: 0,
            prev_offset: 0,
            page_list: vec![(String::from("1"), 0)],
            message: Some(String::from("No results")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rows_yield_empty_page() {
        let page = PageContext::<i32>::from_rows(vec![], 0, 6, 0);
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.page_list, vec![(String::from("1"), 0)]);
    }

    #[test]
    fn first_page_of_three() {
        let page = PageContext::from_rows(vec![1, 2, 3, 4, 5, 6], 15, 6, 0);
        assert_eq!(page.total_rows, 15);
        assert_eq!(page.prev_offset, 0);
        assert_eq!(page.next_offset, 6);
        assert_eq!(page.page_list.len(), 3);
        // current page is masked in the page list
        assert_eq!(page.page_list[0].0, "...");
        assert_eq!(page.page_list[1], (String::from("2"), 6));
        assert_eq!(page.page_list[2], (String::from("3"), 12));
    }

    #[test]
    fn last_page_does_not_advance() {
        let page = PageContext::from_rows(vec![1, 2, 3], 15, 6, 12);
        assert_eq!(page.next_offset, 12);
        assert_eq!(page.prev_offset, 6);
    }

    #[test]
    fn single_page_has_single_entry() {
        let page = PageContext::from_rows(vec![1, 2], 2, 6, 0);
        assert_eq!(page.next_offset, 0);
        assert_eq!(page.page_list.len(), 1);
    }
}
