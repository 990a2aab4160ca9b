//! 存活预测的 HTTP 接口。
//!
//! `POST /survival` 对单条患者记录打分，`GET /` 返回表单页面。
//! 预测器在 `main` 中构建一次后交给 [`routes`]，处理函数只读使用。

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use survival::{PatientRecord, PredictError, SurvivalPredictor};
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("static/index.html");

/// 请求体上限；一条 9 字段的记录远小于该值。
pub const MAX_BODY_BYTES: u64 = 4 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

/// 构建完整路由。
pub fn routes(
    predictor: SurvivalPredictor,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let survival = warp::path("survival")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_predictor(predictor))
        .and_then(handle_survival);

    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    survival.or(index).recover(handle_rejection)
}

fn with_predictor(
    predictor: SurvivalPredictor,
) -> impl Filter<Extract = (SurvivalPredictor,), Error = Infallible> + Clone {
    warp::any().map(move || predictor.clone())
}

async fn handle_survival(
    record: PatientRecord,
    predictor: SurvivalPredictor,
) -> Result<warp::reply::Response, Infallible> {
    match predictor.assess(&record) {
        Ok(assessment) => {
            info!(
                probability = assessment.probability,
                score = assessment.score,
                bucket = %assessment.bucket,
                prediction = assessment.prediction,
                "存活预测完成"
            );
            Ok(
                warp::reply::with_status(warp::reply::json(&assessment.response()), StatusCode::OK)
                    .into_response(),
            )
        }
        Err(PredictError::Feature(err)) => {
            warn!("记录校验失败：{err}");
            Ok(error_response(
                StatusCode::BAD_REQUEST,
                "invalid_field",
                &err.to_string(),
            ))
        }
        Err(err @ PredictError::Model(_)) => {
            error!("{err}");
            Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "model_error",
                "Model scoring failed",
            ))
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> warp::reply::Response {
    let body = ApiError {
        error: message.to_string(),
        code: code.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// 将 warp 的 rejection 转为 JSON 错误。
///
/// 请求体缺失、为空、类型不对或缺少字段时一律返回 400，不会进入处理函数。
pub async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let (status, code, message) =
        if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
            (
                StatusCode::BAD_REQUEST,
                "invalid_body",
                format!("Invalid request body: {e}"),
            )
        } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
            (
                StatusCode::BAD_REQUEST,
                "invalid_body",
                "Request body must be JSON".to_string(),
            )
        } else if err.find::<warp::reject::LengthRequired>().is_some() {
            (
                StatusCode::BAD_REQUEST,
                "invalid_body",
                "Request body is required".to_string(),
            )
        } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Request payload too large".to_string(),
            )
        } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
            (
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
                "Method not allowed".to_string(),
            )
        } else if err.is_not_found() {
            (StatusCode::NOT_FOUND, "not_found", "Not found".to_string())
        } else {
            error!("未处理的 rejection：{:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            )
        };

    Ok(error_response(status, code, &message))
}
