use scaffold_api_types::{DemoDto, PageDto};

use crate::application::pagination::Page;
use crate::domain::entities::DemoRecord;

pub fn demo_dto(record: DemoRecord) -> DemoDto {
    DemoDto {
        id: record.id(),
        name: record.name().to_string(),
        age: record.age(),
        created_at: record.created_at(),
        modified_at: record.modified_at(),
    }
}

pub fn demo_list(records: Vec<DemoRecord>) -> Vec<DemoDto> {
    records.into_iter().map(demo_dto).collect()
}

pub fn demo_page(page: Page<DemoRecord>) -> PageDto<DemoDto> {
    let total_pages = page.total_pages();
    let page = page.map(demo_dto);
    PageDto {
        items: page.items,
        total: page.total,
        page_index: page.page_index,
        page_size: page.page_size,
        total_pages,
    }
}
