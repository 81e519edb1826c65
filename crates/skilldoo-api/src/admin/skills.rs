use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use skilldoo_db::models::SkillChanges;
use skilldoo_types::api::{Ack, CreateSkillRequest, SkillSearchQuery, UpdateSkillRequest};
use skilldoo_types::models::{Skill, SkillUsage};
use skilldoo_types::pagination::{Page, Paginated};

use crate::admin::ADMIN_PAGE_SIZE;
use crate::error::Result;
use crate::extract::{Path, Query, ValidJson};
use crate::{AppState, db};

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SkillSearchQuery>,
) -> Result<Json<Paginated<SkillUsage>>> {
    let page = Page::new(query.page, query.limit, ADMIN_PAGE_SIZE);
    let (skills, total) = db(&state, move |db| {
        db.admin_list_skills(query.search.as_deref(), query.category.as_deref(), page)
    })
    .await?;
    Ok(Json(Paginated::new(skills, page, total)))
}

/// Adding a name that already exists returns the existing entry.
pub async fn create(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateSkillRequest>,
) -> Result<impl IntoResponse> {
    let skill = db(&state, move |db| {
        db.upsert_skill(&req.name, req.category.as_deref(), req.description.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(skill)))
}

pub async fn update(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<UpdateSkillRequest>,
) -> Result<Json<Skill>> {
    let id = req.skill_id;
    let changes = SkillChanges {
        name: req.name,
        category: req.category,
        description: req.description,
    };
    let skill = db(&state, move |db| db.update_skill(id, &changes)).await?;
    info!("Admin updated skill {} ({})", skill.id, skill.name);
    Ok(Json(skill))
}

/// Refused while any swap request still references the skill.
pub async fn remove(
    State(state): State<AppState>,
    Path(skill_id): Path<Uuid>,
) -> Result<Json<Ack>> {
    db(&state, move |db| db.delete_skill(skill_id)).await?;
    info!("Admin deleted skill {}", skill_id);
    Ok(Json(Ack::new("Skill deleted")))
}
