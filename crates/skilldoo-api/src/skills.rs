use axum::{Json, extract::State};

use skilldoo_types::api::SkillSearchQuery;
use skilldoo_types::models::Skill;
use skilldoo_types::pagination::{Page, Paginated};

use crate::error::Result;
use crate::extract::Query;
use crate::{AppState, db};

const SKILL_PAGE_SIZE: u32 = 20;

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SkillSearchQuery>,
) -> Result<Json<Paginated<Skill>>> {
    let page = Page::new(query.page, query.limit, SKILL_PAGE_SIZE);
    let (skills, total) = db(&state, move |db| {
        db.search_skills(query.search.as_deref(), query.category.as_deref(), page)
    })
    .await?;
    Ok(Json(Paginated::new(skills, page, total)))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let categories = db(&state, |db| db.skill_categories()).await?;
    Ok(Json(categories))
}
