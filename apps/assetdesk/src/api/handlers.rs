//! # API Endpoint Handlers
//!
//! Each mutating handler runs exactly one [`Desk`] operation through
//! [`AppState::mutate`], so a refused transition changes nothing.
//!
//! The acting user comes from the `x-assetdesk-actor` header (a numeric
//! user id); requests without it act as user 0.

use super::{
    AppState,
    types::{
        AllocationAssetRequest, AllocationView, AssignmentStatusRequest, CapacityRequest,
        ChecklistLineRequest, CloseJobCardRequest, CreateAllocationRequest,
        CreateClearanceRequest, DocumentRequest, DriverAssignmentRequest, ErrorResponse,
        ExportResponse, HealthResponse, IdResponse, ImportRequest, JobCardRequest,
        MaintenanceRequestBody, MaintenanceStateRequest, NewEmployeeRequest, NewRoomRequest,
        NewRoomTypeRequest, OpenChecklistRequest, PlaceAssetRequest, ProcessClearanceRequest,
        RejectRequest, RemovedResponse, RoomResponse, ServiceRequest, ServiceStateRequest,
        TripRequest, TripTicketRequest, VehicleRequest,
    },
};
use assetdesk_core::clearance::ClearanceRequest;
use assetdesk_core::maintenance::MaintenancePlan;
use assetdesk_core::{
    ActionContext, AllocationId, Asset, AssetId, Checklist, ChecklistId, Desk, DeskError,
    DeskMetrics, JobReport, NewAsset, RecordId, Recipients, RoomId, SubmitReport, UserId,
    VerifyReport,
};
use axum::{
    Json,
    extract::{FromRequestParts, Path, State},
    http::{HeaderName, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::Utc;

/// Header carrying the acting user id.
pub const ACTOR_HEADER: HeaderName = HeaderName::from_static("x-assetdesk-actor");

// =============================================================================
// ERRORS AND EXTRACTORS
// =============================================================================

/// A [`DeskError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(DeskError);

impl From<DeskError> for ApiError {
    fn from(error: DeskError) -> Self {
        Self(error)
    }
}

/// Guards and validation: 422. Missing records: 404. Refused transitions
/// and conflicts: 409. Storage: 500 with a generic body.
pub fn status_for(error: &DeskError) -> StatusCode {
    match error {
        DeskError::Guard(_) | DeskError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DeskError::NotFound { .. } => StatusCode::NOT_FOUND,
        DeskError::InvalidTransition { .. } | DeskError::Conflict(_) => StatusCode::CONFLICT,
        DeskError::SerializationError(_)
        | DeskError::DeserializationError(_)
        | DeskError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), error = %self.0, "Request refused");
        }
        (status, Json(ErrorResponse::from_error(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// The acting user of a request.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub UserId);

impl Actor {
    fn context(self) -> ActionContext {
        ActionContext::new(self.0, Utc::now())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(&ACTOR_HEADER) else {
            return Ok(Self(UserId(0)));
        };
        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .map(|id| Self(UserId(id)))
            .ok_or((StatusCode::BAD_REQUEST, "Invalid x-assetdesk-actor header"))
    }
}

fn allocation_view(desk: &Desk, id: AllocationId) -> Result<AllocationView, DeskError> {
    Ok(AllocationView::from(desk.registry().allocation(id)?))
}

fn checklist_view(desk: &Desk, id: ChecklistId) -> Result<Checklist, DeskError> {
    Ok(desk.registry().checklist(id)?.clone())
}

fn room_view(desk: &Desk, id: RoomId) -> Result<RoomResponse, DeskError> {
    let room = desk.registry().room(id)?;
    Ok(RoomResponse {
        room: room.clone(),
        occupancy: room.occupancy(),
        costs: desk.room_costs(id)?,
    })
}

// =============================================================================
// HEALTH, STATUS, SNAPSHOTS
// =============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Dashboard counts.
pub async fn status_handler(State(state): State<AppState>) -> Json<DeskMetrics> {
    let desk = state.desk.read().await;
    Json(desk.metrics())
}

pub async fn export_handler(State(state): State<AppState>) -> ApiResult<ExportResponse> {
    let desk = state.desk.read().await;
    let bytes = desk.export_bytes()?;
    Ok(Json(ExportResponse::new(&bytes)))
}

/// Replace the whole registry with a snapshot.
pub async fn import_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<ImportRequest>,
) -> ApiResult<DeskMetrics> {
    let bytes = request.decode()?;
    let metrics = state
        .mutate(move |desk| {
            desk.import_bytes(&bytes)?;
            Ok(desk.metrics())
        })
        .await?;
    tracing::info!(actor = %actor.0, assets = metrics.assets.total, "Registry imported");
    Ok(Json(metrics))
}

// =============================================================================
// MASTER DATA
// =============================================================================

pub async fn list_assets_handler(State(state): State<AppState>) -> Json<Vec<Asset>> {
    let desk = state.desk.read().await;
    Json(desk.registry().assets.values().cloned().collect())
}

pub async fn get_asset_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Asset> {
    let desk = state.desk.read().await;
    Ok(Json(desk.registry().asset(AssetId(id))?.clone()))
}

pub async fn add_asset_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<NewAsset>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state.mutate(move |desk| desk.add_asset(request)).await?;
    tracing::info!(actor = %actor.0, asset = %id, "Asset registered");
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn validate_asset_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
) -> ApiResult<Asset> {
    let id = AssetId(id);
    let asset = state
        .mutate(|desk| {
            desk.validate_asset(id)?;
            Ok(desk.registry().asset(id)?.clone())
        })
        .await?;
    tracing::info!(actor = %actor.0, asset = %id, "Asset validated");
    Ok(Json(asset))
}

pub async fn scrap_asset_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
) -> ApiResult<Asset> {
    let id = AssetId(id);
    let asset = state
        .mutate(|desk| {
            desk.scrap_asset(id)?;
            Ok(desk.registry().asset(id)?.clone())
        })
        .await?;
    tracing::info!(actor = %actor.0, asset = %id, "Asset scrapped");
    Ok(Json(asset))
}

/// Put an asset into a room, or take it out with `{"room": null}`.
pub async fn place_asset_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<PlaceAssetRequest>,
) -> ApiResult<Asset> {
    let id = AssetId(id);
    let asset = state
        .mutate(|desk| {
            desk.place_asset(id, request.room)?;
            Ok(desk.registry().asset(id)?.clone())
        })
        .await?;
    Ok(Json(asset))
}

pub async fn add_employee_handler(
    State(state): State<AppState>,
    Json(request): Json<NewEmployeeRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| desk.add_employee(&request.name, request.email, request.is_driver))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn set_recipients_handler(
    State(state): State<AppState>,
    Json(recipients): Json<Recipients>,
) -> ApiResult<Recipients> {
    let saved = recipients.clone();
    state
        .mutate(move |desk| desk.set_recipients(recipients))
        .await?;
    Ok(Json(saved))
}

pub async fn add_room_type_handler(
    State(state): State<AppState>,
    Json(request): Json<NewRoomTypeRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| {
            desk.add_room_type(
                &request.name,
                request.additional_cost_cents,
                request.template,
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn add_room_handler(
    State(state): State<AppState>,
    Json(request): Json<NewRoomRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| {
            desk.add_room(
                &request.name,
                request.block,
                request.capacity,
                request.room_type,
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

/// A room with its occupancy and costs.
pub async fn get_room_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<RoomResponse> {
    let desk = state.desk.read().await;
    Ok(Json(room_view(&desk, RoomId(id))?))
}

pub async fn mark_room_done_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<RoomResponse> {
    let id = RoomId(id);
    let room = state
        .mutate(|desk| {
            desk.mark_room_done(id)?;
            room_view(desk, id)
        })
        .await?;
    Ok(Json(room))
}

pub async fn set_room_capacity_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CapacityRequest>,
) -> ApiResult<RoomResponse> {
    let id = RoomId(id);
    let room = state
        .mutate(|desk| {
            desk.set_room_capacity(id, request.capacity)?;
            room_view(desk, id)
        })
        .await?;
    Ok(Json(room))
}

// =============================================================================
// ALLOCATIONS
// =============================================================================

pub async fn create_allocation_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateAllocationRequest>,
) -> Result<(StatusCode, Json<AllocationView>), ApiError> {
    let ctx = actor.context();
    let view = state
        .mutate(|desk| {
            let id = desk.create_allocation(&ctx, request.kind, request.holder)?;
            allocation_view(desk, id)
        })
        .await?;
    tracing::info!(
        actor = %ctx.actor,
        allocation = %view.reference,
        kind = view.kind.name(),
        "Allocation created"
    );
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_allocation_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<AllocationView> {
    let desk = state.desk.read().await;
    Ok(Json(allocation_view(&desk, AllocationId(id))?))
}

pub async fn add_allocation_asset_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AllocationAssetRequest>,
) -> ApiResult<AllocationView> {
    let id = AllocationId(id);
    let view = state
        .mutate(|desk| {
            desk.add_allocation_asset(id, request.asset)?;
            allocation_view(desk, id)
        })
        .await?;
    Ok(Json(view))
}

pub async fn remove_allocation_asset_handler(
    State(state): State<AppState>,
    Path((id, asset)): Path<(u64, u64)>,
) -> ApiResult<RemovedResponse> {
    let removed = state
        .mutate(|desk| desk.remove_allocation_asset(AllocationId(id), AssetId(asset)))
        .await?;
    Ok(Json(RemovedResponse { removed }))
}

pub async fn submit_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
) -> ApiResult<SubmitReport> {
    let ctx = actor.context();
    let report = state
        .mutate(|desk| desk.submit(&ctx, AllocationId(id)))
        .await?;
    tracing::info!(
        actor = %ctx.actor,
        allocation = id,
        state = report.state.name(),
        "Allocation submitted"
    );
    if let Some(warning) = &report.warning {
        tracing::warn!(allocation = id, "{}", warning);
    }
    Ok(Json(report))
}

pub async fn approve_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
) -> ApiResult<AllocationView> {
    let ctx = actor.context();
    let id = AllocationId(id);
    let view = state
        .mutate(|desk| {
            desk.approve(&ctx, id)?;
            allocation_view(desk, id)
        })
        .await?;
    tracing::info!(actor = %ctx.actor, allocation = %view.reference, "Allocation approved");
    Ok(Json(view))
}

pub async fn reset_to_draft_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<AllocationView> {
    let id = AllocationId(id);
    let view = state
        .mutate(|desk| {
            desk.reset_to_draft(id)?;
            allocation_view(desk, id)
        })
        .await?;
    Ok(Json(view))
}

pub async fn cancel_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
) -> ApiResult<AllocationView> {
    let id = AllocationId(id);
    let view = state
        .mutate(|desk| {
            desk.cancel(id)?;
            allocation_view(desk, id)
        })
        .await?;
    tracing::info!(actor = %actor.0, allocation = %view.reference, "Allocation cancelled");
    Ok(Json(view))
}

pub async fn reject_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
    Json(request): Json<RejectRequest>,
) -> ApiResult<AllocationView> {
    let id = AllocationId(id);
    let view = state
        .mutate(|desk| {
            desk.reject(id, &request.reason)?;
            allocation_view(desk, id)
        })
        .await?;
    tracing::info!(actor = %actor.0, allocation = %view.reference, "Allocation rejected");
    Ok(Json(view))
}

/// Open (or top up) the check-in or check-out checklist.
pub async fn open_checklist_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
    Json(request): Json<OpenChecklistRequest>,
) -> Result<(StatusCode, Json<Checklist>), ApiError> {
    let ctx = actor.context();
    let checklist = state
        .mutate(|desk| {
            let checklist = desk.open_checklist(&ctx, AllocationId(id), request.kind)?;
            checklist_view(desk, checklist)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(checklist)))
}

pub async fn allocate_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
) -> ApiResult<AllocationView> {
    let ctx = actor.context();
    let id = AllocationId(id);
    let view = state
        .mutate(|desk| {
            desk.allocate(&ctx, id)?;
            allocation_view(desk, id)
        })
        .await?;
    tracing::info!(
        actor = %ctx.actor,
        allocation = %view.reference,
        holder = %view.holder_label,
        "Assets allocated"
    );
    Ok(Json(view))
}

pub async fn return_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
) -> ApiResult<AllocationView> {
    let ctx = actor.context();
    let id = AllocationId(id);
    let view = state
        .mutate(|desk| {
            desk.return_allocation(&ctx, id)?;
            allocation_view(desk, id)
        })
        .await?;
    tracing::info!(actor = %ctx.actor, allocation = %view.reference, "Assets returned");
    Ok(Json(view))
}

// =============================================================================
// CHECKLISTS AND FOLLOW-UPS
// =============================================================================

pub async fn get_checklist_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Checklist> {
    let desk = state.desk.read().await;
    Ok(Json(checklist_view(&desk, ChecklistId(id))?))
}

pub async fn set_checklist_line_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ChecklistLineRequest>,
) -> ApiResult<Checklist> {
    let id = ChecklistId(id);
    let checklist = state
        .mutate(move |desk| {
            desk.set_checklist_line(id, request.asset, request.status, request.remarks)?;
            checklist_view(desk, id)
        })
        .await?;
    Ok(Json(checklist))
}

pub async fn attach_document_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
    Json(request): Json<DocumentRequest>,
) -> ApiResult<Checklist> {
    let ctx = actor.context();
    let id = ChecklistId(id);
    let content = request.decode()?;
    let checklist = state
        .mutate(move |desk| {
            desk.attach_document(&ctx, id, &request.filename, content)?;
            checklist_view(desk, id)
        })
        .await?;
    Ok(Json(checklist))
}

pub async fn verify_checklist_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
) -> ApiResult<VerifyReport> {
    let ctx = actor.context();
    let report = state
        .mutate(|desk| desk.verify_checklist(&ctx, ChecklistId(id)))
        .await?;
    tracing::info!(
        actor = %ctx.actor,
        checklist = id,
        status = report.status.name(),
        flagged = report.flagged.len(),
        "Checklist verified"
    );
    Ok(Json(report))
}

pub async fn reset_checklist_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Checklist> {
    let id = ChecklistId(id);
    let checklist = state
        .mutate(|desk| {
            desk.reset_checklist(id)?;
            checklist_view(desk, id)
        })
        .await?;
    Ok(Json(checklist))
}

pub async fn advance_follow_up_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|desk| desk.advance_follow_up(RecordId(id)))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// CLEARANCE
// =============================================================================

pub async fn create_clearance_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateClearanceRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let ctx = actor.context();
    let id = state
        .mutate(|desk| desk.create_clearance(&ctx, request.employee, request.room))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn get_clearance_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<ClearanceRequest> {
    let desk = state.desk.read().await;
    let clearance = desk
        .registry()
        .clearances
        .get(&RecordId(id))
        .ok_or_else(|| DeskError::not_found("Clearance request", id))?;
    Ok(Json(clearance.clone()))
}

pub async fn process_clearance_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<u64>,
    Json(request): Json<ProcessClearanceRequest>,
) -> ApiResult<ClearanceRequest> {
    let id = RecordId(id);
    let clearance = state
        .mutate(|desk| {
            desk.process_clearance(id, request.checklist)?;
            desk.registry()
                .clearances
                .get(&id)
                .cloned()
                .ok_or_else(|| DeskError::not_found("Clearance request", id.0))
        })
        .await?;
    tracing::info!(
        actor = %actor.0,
        clearance = %clearance.reference,
        state = clearance.state.name(),
        deductions = clearance.deductions.len(),
        "Clearance processed"
    );
    Ok(Json(clearance))
}

// =============================================================================
// FLEET
// =============================================================================

pub async fn add_vehicle_handler(
    State(state): State<AppState>,
    Json(request): Json<VehicleRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| desk.add_vehicle(request.into_vehicle()))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn add_service_handler(
    State(state): State<AppState>,
    Json(request): Json<ServiceRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| desk.add_service_log(request.into_service()))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn set_service_state_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ServiceStateRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|desk| desk.set_service_state(RecordId(id), request.state))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_trip_handler(
    State(state): State<AppState>,
    Json(request): Json<TripRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| desk.add_trip(request.into_trip()))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn add_trip_ticket_handler(
    State(state): State<AppState>,
    Json(request): Json<TripTicketRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| desk.add_trip_ticket(request.into_ticket()))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn add_driver_assignment_handler(
    State(state): State<AppState>,
    Json(request): Json<DriverAssignmentRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| desk.add_driver_assignment(request.into_assignment()))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn set_assignment_status_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AssignmentStatusRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|desk| desk.set_assignment_status(RecordId(id), request.status))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn open_job_card_handler(
    State(state): State<AppState>,
    Json(request): Json<JobCardRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state
        .mutate(move |desk| desk.open_job_card(request.into_card()))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn close_job_card_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CloseJobCardRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|desk| desk.close_job_card(RecordId(id), request.time_out))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// MAINTENANCE AND JOBS
// =============================================================================

pub async fn set_maintenance_plan_handler(
    State(state): State<AppState>,
    Json(plan): Json<MaintenancePlan>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(move |desk| desk.set_maintenance_plan(plan))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn open_maintenance_request_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<MaintenanceRequestBody>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let date = request
        .request_date
        .unwrap_or_else(|| actor.context().today());
    let id = state
        .mutate(move |desk| {
            desk.open_maintenance_request(request.asset, request.kind, date, request.description)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse::new(id.0))))
}

pub async fn set_maintenance_state_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<MaintenanceStateRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|desk| desk.set_maintenance_state(RecordId(id), request.state))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run expiry alerts and maintenance recurrence now.
pub async fn run_jobs_handler(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<JobReport> {
    let ctx = actor.context();
    let report = state.mutate(|desk| desk.run_daily_jobs(&ctx)).await?;
    tracing::info!(
        actor = %ctx.actor,
        expiry_alerts = report.expiry_alerts,
        maintenance_requests = report.maintenance_requests.len(),
        "Daily jobs run on request"
    );
    Ok(Json(report))
}
