use log::{error, info};
use serde::Deserialize;
use serde_json::json;

use carnage_nn::{train_loop, Architecture, Matrix, Network, TrainConfig};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::routes::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::store::models::{NewModel, StoredModel};
use crate::util::request::parse_json;

const MAX_NAME_CHARS: usize = 255;

fn default_activation() -> String {
    "relu".into()
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_epochs() -> usize {
    1000
}

#[derive(Deserialize)]
struct TrainRequest {
    name: String,
    #[serde(alias = "layers")]
    architecture: Vec<usize>,
    #[serde(default = "default_activation")]
    activation: String,
    #[serde(default = "default_learning_rate")]
    learning_rate: f64,
    #[serde(default = "default_epochs")]
    epochs: usize,
    #[serde(rename = "X")]
    x: Vec<Vec<f64>>,
    y: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct PredictRequest {
    model_id: u64,
    #[serde(rename = "X")]
    x: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct RenameRequest {
    name: String,
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(ApiError::BadRequest(format!("name must be 1 to {MAX_NAME_CHARS} characters")));
    }
    Ok(name.to_owned())
}

/// The listing/detail shape of a stored model. Parameters are only served
/// through the download route.
fn model_view(model: &StoredModel) -> serde_json::Value {
    json!({
        "id": model.id,
        "name": model.name,
        "architecture": model.parameters.architecture,
        "activation": model.parameters.activation,
        "learning_rate": model.parameters.learning_rate,
        "epochs": model.epochs,
        "accuracy": model.accuracy,
        "loss": model.loss,
        "created_at": model.created_at,
        "updated_at": model.updated_at,
        "history": model.history,
    })
}

/// Rejects architectures the service will not allocate, before any weights exist.
fn check_model_size(config: &ServerConfig, architecture: &Architecture) -> Result<(), ApiError> {
    if let Some(&widest) = architecture.as_slice().iter().max().filter(|&&n| n > config.max_layer_units) {
        return Err(ApiError::BadRequest(format!(
            "layers may have at most {} units, got {widest}",
            config.max_layer_units
        )));
    }
    if architecture.parameter_count() > config.max_parameters {
        return Err(ApiError::BadRequest(format!(
            "model would have {} parameters; at most {} are accepted",
            architecture.parameter_count(),
            config.max_parameters
        )));
    }
    Ok(())
}

/// `GET /api/models`
pub fn list(state: &AppState, user_id: u64) -> ApiResult {
    let models: Vec<serde_json::Value> = state.models.list(user_id).iter().map(model_view).collect();
    Ok(ApiResponse::ok(json!(models)))
}

/// `POST /api/models/train`
///
/// Trains synchronously on the request thread, then stores the result.
pub fn train(state: &AppState, user_id: u64, body: &str) -> ApiResult {
    let req: TrainRequest = parse_json(body)?;
    let config = &state.config;

    let name = validate_name(&req.name)?;
    if req.epochs == 0 || req.epochs > config.max_epochs {
        return Err(ApiError::BadRequest(format!("epochs must be between 1 and {}", config.max_epochs)));
    }
    if !(config.min_learning_rate..=config.max_learning_rate).contains(&req.learning_rate) {
        return Err(ApiError::BadRequest(format!(
            "learning_rate must be between {} and {}",
            config.min_learning_rate, config.max_learning_rate
        )));
    }
    if req.x.is_empty() {
        return Err(ApiError::BadRequest("X must contain at least one row".into()));
    }
    if req.x.len() > config.max_batch_rows {
        return Err(ApiError::BadRequest(format!(
            "X has {} rows; at most {} are accepted",
            req.x.len(),
            config.max_batch_rows
        )));
    }

    let architecture = Architecture::new(req.architecture)?;
    check_model_size(config, &architecture)?;
    let x = Matrix::from_rows(req.x)?;
    let y = Matrix::from_rows(req.y)?;
    if x.cols() != architecture.input_units() {
        return Err(ApiError::BadRequest(format!(
            "X rows have {} values but the input layer has {} units",
            x.cols(),
            architecture.input_units()
        )));
    }
    if y.cols() != architecture.output_units() || y.rows() != x.rows() {
        return Err(ApiError::BadRequest(format!(
            "y must be {}x{} to match X and the output layer, got {}x{}",
            x.rows(),
            architecture.output_units(),
            y.rows(),
            y.cols()
        )));
    }
    let mut network = Network::new(architecture.as_slice(), &req.activation, req.learning_rate)?;

    let train_config = TrainConfig::new(req.epochs).with_checkpoint_every(config.checkpoint_every);
    let report = train_loop(&mut network, &x, &y, &train_config)?;

    let parameters = network.export();
    let size = parameters.to_json()?.len();
    state.users.record_model(user_id, size)?;
    let inserted = state.models.insert(NewModel {
        owner: user_id,
        name,
        epochs: req.epochs,
        parameters,
        accuracy: report.final_accuracy,
        loss: report.final_loss,
        history: report.checkpoints,
    });
    let model = match inserted {
        Ok(model) => model,
        Err(e) => {
            if let Err(rollback) = state.users.forget_model(user_id, size) {
                error!("user {user_id}: profile rollback after failed model save also failed: {rollback}");
            }
            return Err(e.into());
        }
    };

    info!(
        "user {} trained model {} '{}': {} epochs, loss {:.4}, accuracy {:.3}",
        user_id, model.id, model.name, model.epochs, model.loss, model.accuracy
    );

    Ok(ApiResponse::created(json!({
        "model_id": model.id,
        "name": model.name,
        "accuracy": model.accuracy,
        "loss": model.loss,
        "message": "Model trained successfully",
    })))
}

/// `POST /api/models/predict`
pub fn predict(state: &AppState, user_id: u64, body: &str) -> ApiResult {
    let req: PredictRequest = parse_json(body)?;
    if req.x.len() > state.config.max_batch_rows {
        return Err(ApiError::BadRequest(format!(
            "X has {} rows; at most {} are accepted",
            req.x.len(),
            state.config.max_batch_rows
        )));
    }

    let model = state.models.get(user_id, req.model_id)?;
    let network = Network::from_snapshot(model.parameters)?;
    let x = Matrix::from_rows(req.x)?;
    let probabilities = network.probabilities(&x)?;

    Ok(ApiResponse::ok(json!({
        "predictions": probabilities.argmax_rows(),
        "probabilities": probabilities.to_rows(),
    })))
}

/// `GET /api/models/{id}`
pub fn get(state: &AppState, user_id: u64, id: u64) -> ApiResult {
    let model = state.models.get(user_id, id)?;
    Ok(ApiResponse::ok(model_view(&model)))
}

/// `PATCH /api/models/{id}`
pub fn rename(state: &AppState, user_id: u64, id: u64, body: &str) -> ApiResult {
    let req: RenameRequest = parse_json(body)?;
    let name = validate_name(&req.name)?;
    let model = state.models.rename(user_id, id, name)?;
    Ok(ApiResponse::ok(model_view(&model)))
}

/// `DELETE /api/models/{id}`
pub fn delete(state: &AppState, user_id: u64, id: u64) -> ApiResult {
    let model = state.models.delete(user_id, id)?;
    state.users.release_storage(user_id, model.parameters.to_json()?.len())?;
    info!("user {} deleted model {}", user_id, id);
    Ok(ApiResponse::no_content())
}

/// `GET /api/models/{id}/download`
///
/// Serves the exported parameters as a JSON attachment that
/// `Network::import` accepts.
pub fn download(state: &AppState, user_id: u64, id: u64) -> ApiResult {
    let model = state.models.get(user_id, id)?;
    let json = model.parameters.to_json()?;
    Ok(ApiResponse::download(format!("model-{id}.json"), json))
}
