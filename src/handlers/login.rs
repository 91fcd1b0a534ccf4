use axum::{extract::State, response::Json};

use crate::auth::IdentityClaims;
use crate::entities::user::Model as UserModel;
use crate::{ApiResponse, ApiResult, AppState};

/// Registers the verified identity locally on first use and returns the account.
pub async fn login(
    State(state): State<AppState>,
    claims: IdentityClaims,
) -> ApiResult<UserModel> {
    let user = state.services.users.login(&claims.email).await?;
    Ok(Json(ApiResponse::success(user)))
}
