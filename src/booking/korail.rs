//! Korail mobile API client implementation
//!
//! This module implements the ReservationClient trait for the Korail
//! (Korea Railroad) mobile endpoints: login, schedule search and ticket
//! reservation. Every endpoint answers with a JSON envelope carrying
//! `strResult` (`SUCC` / `FAIL`) plus a message code on failure.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::booking::client::{BookingError, Credentials, ReservationClient, SearchQuery, Seat, Session, Train};
use crate::domain::route::{DATE_FORMAT, TIME_FORMAT, parse_date, parse_time};

/// Korail mobile API base URL
pub const KORAIL_BASE_URL: &str = "https://smart.letskorail.com:443";

const LOGIN_PATH: &str = "/classes/com.korail.mobile.login.Login";
const SEARCH_PATH: &str = "/classes/com.korail.mobile.seatMovie.ScheduleView";
const RESERVE_PATH: &str = "/classes/com.korail.mobile.certification.TicketReservation";

/// Default user agent expected by the mobile endpoints
pub const DEFAULT_USER_AGENT: &str = "Dalvik/2.1.0 (Linux; U; Android 5.1.1; Nexus 4 Build/LMY48T)";

const DEVICE: &str = "AD";
const API_VERSION: &str = "190617001";

/// Train group code meaning "all train types"
const ALL_TRAINS: &str = "109";

/// Seat availability code for "seats available"
const SEATS_AVAILABLE: &str = "11";

/// Message codes the provider uses when a search matches nothing
const NO_RESULTS_CODES: &[&str] = &["P100", "WRG000000", "WRD000061", "WRT300005"];

/// Message codes the provider uses when the train sold out before reserving
const SOLD_OUT_CODES: &[&str] = &["ERR211161"];

/// Configuration for the Korail client
#[derive(Debug, Clone)]
pub struct KorailConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for KorailConfig {
    fn default() -> Self {
        Self {
            base_url: KORAIL_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Korail mobile API client
pub struct KorailClient {
    client: Client,
    config: KorailConfig,
}

impl KorailClient {
    /// Create a client; the cookie store carries the login session between calls
    pub fn new(config: KorailConfig) -> Result<Self, BookingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn call(&self, path: &str, params: &[(&str, String)]) -> Result<Envelope, BookingError> {
        log::debug!("GET {}", path);
        self.send(self.client.get(self.url(path)).query(params)).await
    }

    /// Form-encoded POST; keeps secrets out of the request URL
    async fn post_form(&self, path: &str, params: &[(&str, String)]) -> Result<Envelope, BookingError> {
        log::debug!("POST {}", path);
        self.send(self.client.post(self.url(path)).form(params)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Envelope, BookingError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookingError::remote(status.as_u16().to_string(), "unexpected HTTP status"));
        }

        let body: Value = response.json().await?;
        Envelope::from_value(body)
    }
}

/// Login input flag: 2 = membership number, 4 = phone, 5 = email
fn input_flag(identifier: &str) -> &'static str {
    if identifier.contains('@') {
        "5"
    } else if identifier.contains('-') && identifier.chars().all(|c| c.is_ascii_digit() || c == '-') {
        "4"
    } else {
        "2"
    }
}

#[async_trait]
impl ReservationClient for KorailClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, BookingError> {
        let params = [
            ("Device", DEVICE.to_string()),
            ("Version", API_VERSION.to_string()),
            ("txtInputFlg", input_flag(&credentials.identifier).to_string()),
            ("txtMemberNo", credentials.identifier.clone()),
            ("txtPwd", credentials.password.clone()),
        ];

        let envelope = self.post_form(LOGIN_PATH, &params).await.map_err(|e| match e {
            BookingError::Remote { code, message } => BookingError::Auth(format!("{} ({})", message, code)),
            other => other,
        })?;

        let key = envelope
            .str_field("Key")
            .ok_or_else(|| BookingError::Auth("login response carried no session key".to_string()))?;
        let mut session = Session::new(key);
        if let Some(name) = envelope.str_field("strCustNm") {
            session = session.with_holder(name);
        }
        log::info!("Logged in as {}", session.holder.as_deref().unwrap_or("<unknown>"));
        Ok(session)
    }

    async fn search_trains(&self, session: &Session, query: &SearchQuery) -> Result<Vec<Train>, BookingError> {
        let params = [
            ("Device", DEVICE.to_string()),
            ("Version", API_VERSION.to_string()),
            ("Key", session.token.clone()),
            ("radJobId", "1".to_string()),
            ("selGoTrain", ALL_TRAINS.to_string()),
            ("txtCardPsgCnt", "0".to_string()),
            ("txtGdNo", String::new()),
            ("txtGoAbrdDt", query.date.format(DATE_FORMAT).to_string()),
            ("txtGoEnd", query.arrival.clone()),
            ("txtGoHour", query.time.format(TIME_FORMAT).to_string()),
            ("txtGoStart", query.departure.clone()),
            ("txtJobDv", String::new()),
            ("txtMenuId", "11".to_string()),
            ("txtPsgFlg_1", "1".to_string()),
            ("txtPsgFlg_2", "0".to_string()),
            ("txtPsgFlg_3", "0".to_string()),
            ("txtPsgFlg_4", "0".to_string()),
            ("txtPsgFlg_5", "0".to_string()),
            ("txtSeatAttCd_2", "000".to_string()),
            ("txtSeatAttCd_3", "000".to_string()),
            ("txtSeatAttCd_4", "015".to_string()),
            ("txtTrnGpCd", ALL_TRAINS.to_string()),
        ];

        let envelope = self.call(SEARCH_PATH, &params).await?;
        let infos: Vec<TrainInfo> = match envelope.body.pointer("/trn_infos/trn_info") {
            Some(list) => serde_json::from_value(list.clone())
                .map_err(|e| BookingError::InvalidResponse(format!("train list: {}", e)))?,
            None => Vec::new(),
        };

        let trains = infos
            .into_iter()
            .filter(|info| query.include_sold_out || info.has_seat())
            .map(TrainInfo::into_train)
            .collect::<Result<Vec<_>, _>>()?;

        if trains.is_empty() {
            return Err(BookingError::NoResults);
        }
        log::debug!("Search {} -> {} found {} trains", query.departure, query.arrival, trains.len());
        Ok(trains)
    }

    async fn reserve(&self, session: &Session, train: &Train) -> Result<Seat, BookingError> {
        let info: TrainInfo = serde_json::from_value(train.provider_ref.clone())
            .map_err(|e| BookingError::InvalidResponse(format!("train is missing provider codes: {}", e)))?;

        // General seats first, special seats only when general is gone
        let (seat_class, seat_label) = if info.h_gen_rsv_cd == SEATS_AVAILABLE {
            ("1", "general")
        } else {
            ("2", "special")
        };

        let params = [
            ("Device", DEVICE.to_string()),
            ("Version", API_VERSION.to_string()),
            ("Key", session.token.clone()),
            ("txtGdNo", String::new()),
            ("txtJobId", "1101".to_string()),
            ("txtTotPsgCnt", "1".to_string()),
            ("txtSeatAttCd1", "000".to_string()),
            ("txtSeatAttCd2", "000".to_string()),
            ("txtSeatAttCd3", "000".to_string()),
            ("txtSeatAttCd4", "015".to_string()),
            ("txtSeatAttCd5", "000".to_string()),
            ("hidFreeFlg", "N".to_string()),
            ("txtStndFlg", "N".to_string()),
            ("txtMenuId", "11".to_string()),
            ("txtSrcarCnt", "0".to_string()),
            ("txtJrnyCnt", "1".to_string()),
            ("txtJrnySqno1", "001".to_string()),
            ("txtJrnyTpCd1", "11".to_string()),
            ("txtDptDt1", info.h_dpt_dt.clone()),
            ("txtDptRsStnCd1", info.h_dpt_rs_stn_cd.clone()),
            ("txtDptTm1", info.h_dpt_tm.clone()),
            ("txtArvRsStnCd1", info.h_arv_rs_stn_cd.clone()),
            ("txtTrnNo1", info.h_trn_no.clone()),
            ("txtRunDt1", info.h_run_dt.clone()),
            ("txtTrnClsfCd1", info.h_trn_clsf_cd.clone()),
            ("txtPsrmClCd1", seat_class.to_string()),
            ("txtTrnGpCd1", info.h_trn_gp_cd.clone()),
            ("txtChgFlg1", String::new()),
            ("txtPsgTpCd1", "1".to_string()),
            ("txtDiscKndCd1", "000".to_string()),
            ("txtCompaCnt1", "1".to_string()),
            ("txtCardCode_1", String::new()),
            ("txtCardNo_1", String::new()),
            ("txtCardPw_1", String::new()),
        ];

        let envelope = self.call(RESERVE_PATH, &params).await?;
        let reservation_id = envelope
            .str_field("h_pnr_no")
            .ok_or_else(|| BookingError::InvalidResponse("reservation response carried no h_pnr_no".to_string()))?;

        Ok(Seat {
            reservation_id,
            train: train.clone(),
            detail: Some(seat_label.to_string()),
        })
    }
}

/// Parsed `strResult` envelope
#[derive(Debug)]
struct Envelope {
    body: Value,
}

impl Envelope {
    /// Split a raw response into success or a classified provider error
    fn from_value(body: Value) -> Result<Self, BookingError> {
        match body.get("strResult").and_then(Value::as_str) {
            Some("SUCC") => Ok(Self { body }),
            Some("FAIL") => {
                let code = body.get("h_msg_cd").and_then(Value::as_str).unwrap_or_default();
                let message = body.get("h_msg_txt").and_then(Value::as_str).unwrap_or_default();
                Err(classify_failure(code, message))
            }
            other => Err(BookingError::InvalidResponse(format!("unexpected strResult {:?}", other))),
        }
    }

    fn str_field(&self, name: &str) -> Option<String> {
        self.body
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn classify_failure(code: &str, message: &str) -> BookingError {
    if NO_RESULTS_CODES.contains(&code) {
        BookingError::NoResults
    } else if SOLD_OUT_CODES.contains(&code) {
        BookingError::SoldOut
    } else {
        BookingError::remote(code, message)
    }
}

/// One `trn_info` record from a schedule search
#[derive(Debug, Clone, Deserialize, Serialize)]
struct TrainInfo {
    h_trn_no: String,
    #[serde(default)]
    h_trn_clsf_cd: String,
    #[serde(default)]
    h_trn_clsf_nm: String,
    #[serde(default)]
    h_trn_gp_cd: String,
    h_dpt_rs_stn_nm: String,
    #[serde(default)]
    h_dpt_rs_stn_cd: String,
    h_dpt_dt: String,
    h_dpt_tm: String,
    h_arv_rs_stn_nm: String,
    #[serde(default)]
    h_arv_rs_stn_cd: String,
    h_arv_tm: String,
    #[serde(default)]
    h_run_dt: String,
    #[serde(default)]
    h_gen_rsv_cd: String,
    #[serde(default)]
    h_spe_rsv_cd: String,
}

impl TrainInfo {
    fn has_seat(&self) -> bool {
        self.h_gen_rsv_cd == SEATS_AVAILABLE || self.h_spe_rsv_cd == SEATS_AVAILABLE
    }

    fn into_train(self) -> Result<Train, BookingError> {
        let date: NaiveDate = parse_date(&self.h_dpt_dt).map_err(BookingError::InvalidResponse)?;
        let departure_time: NaiveTime = parse_time(&self.h_dpt_tm).map_err(BookingError::InvalidResponse)?;
        let arrival_time: NaiveTime = parse_time(&self.h_arv_tm).map_err(BookingError::InvalidResponse)?;
        let provider_ref =
            serde_json::to_value(&self).map_err(|e| BookingError::InvalidResponse(e.to_string()))?;

        Ok(Train {
            number: self.h_trn_no,
            kind: self.h_trn_clsf_nm,
            departure: self.h_dpt_rs_stn_nm,
            arrival: self.h_arv_rs_stn_nm,
            date,
            departure_time,
            arrival_time,
            provider_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> KorailClient {
        KorailClient::new(KorailConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    fn train_info(no: &str, general: &str, special: &str) -> Value {
        json!({
            "h_trn_no": no,
            "h_trn_clsf_cd": "100",
            "h_trn_clsf_nm": "KTX",
            "h_trn_gp_cd": "100",
            "h_dpt_rs_stn_nm": "전주",
            "h_dpt_rs_stn_cd": "0045",
            "h_dpt_dt": "20240917",
            "h_dpt_tm": "193000",
            "h_arv_rs_stn_nm": "서울",
            "h_arv_rs_stn_cd": "0001",
            "h_arv_tm": "211200",
            "h_run_dt": "20240917",
            "h_gen_rsv_cd": general,
            "h_spe_rsv_cd": special
        })
    }

    fn query() -> SearchQuery {
        let route = crate::domain::Route::parse("전주", "서울", "20240917", "193000").unwrap();
        SearchQuery::for_route(&route)
    }

    #[test]
    fn test_input_flag() {
        assert_eq!(input_flag("010-1234-5678"), "4");
        assert_eq!(input_flag("someone@example.com"), "5");
        assert_eq!(input_flag("1234567890"), "2");
    }

    #[test]
    fn test_classify_failure_codes() {
        assert!(matches!(classify_failure("P100", ""), BookingError::NoResults));
        assert!(matches!(classify_failure("WRD000061", ""), BookingError::NoResults));
        assert!(matches!(classify_failure("ERR211161", ""), BookingError::SoldOut));
        assert!(matches!(
            classify_failure("P058", "login required"),
            BookingError::Remote { .. }
        ));
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(query_param_is_missing("txtPwd"))
            .and(body_string_contains("txtInputFlg=4"))
            .and(body_string_contains("txtMemberNo=010-1234-5678"))
            .and(body_string_contains("txtPwd=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "strResult": "SUCC",
                "Key": "session-key",
                "strCustNm": "홍길동",
                "strMbCrdNo": "1234567890"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = client
            .authenticate(&Credentials::new("010-1234-5678", "s3cret"))
            .await
            .unwrap();
        assert_eq!(session.token, "session-key");
        assert_eq!(session.holder.as_deref(), Some("홍길동"));
    }

    #[tokio::test]
    async fn test_authenticate_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "strResult": "FAIL",
                "h_msg_cd": "P058",
                "h_msg_txt": "비밀번호 오류"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .authenticate(&Credentials::new("010-1234-5678", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Auth(_)));
    }

    #[tokio::test]
    async fn test_search_filters_trains_without_seats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("txtGoStart", "전주"))
            .and(query_param("txtGoAbrdDt", "20240917"))
            .and(query_param("txtGoHour", "193000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "strResult": "SUCC",
                "trn_infos": { "trn_info": [
                    train_info("101", "13", "13"),
                    train_info("103", "11", "13"),
                    train_info("105", "13", "11")
                ]}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let trains = client.search_trains(&Session::new("k"), &query()).await.unwrap();
        let numbers: Vec<&str> = trains.iter().map(|t| t.number.as_str()).collect();
        assert_eq!(numbers, vec!["103", "105"]);
        assert_eq!(trains[0].kind, "KTX");
        assert_eq!(trains[0].departure_time, NaiveTime::from_hms_opt(19, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_search_all_sold_out_is_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "strResult": "SUCC",
                "trn_infos": { "trn_info": [ train_info("101", "13", "13") ] }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.search_trains(&Session::new("k"), &query()).await.unwrap_err();
        assert!(matches!(err, BookingError::NoResults));
    }

    #[tokio::test]
    async fn test_search_provider_no_results_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "strResult": "FAIL",
                "h_msg_cd": "P100",
                "h_msg_txt": "조회 결과가 없습니다"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.search_trains(&Session::new("k"), &query()).await.unwrap_err();
        assert!(matches!(err, BookingError::NoResults));
    }

    #[tokio::test]
    async fn test_reserve_success_and_sold_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "strResult": "SUCC",
                "trn_infos": { "trn_info": [ train_info("103", "11", "13"), train_info("105", "13", "11") ] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RESERVE_PATH))
            .and(query_param("txtTrnNo1", "103"))
            .and(query_param("txtPsrmClCd1", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "strResult": "SUCC",
                "h_pnr_no": "PNR-0001"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RESERVE_PATH))
            .and(query_param("txtTrnNo1", "105"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "strResult": "FAIL",
                "h_msg_cd": "ERR211161",
                "h_msg_txt": "매진"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = Session::new("k");
        let trains = client.search_trains(&session, &query()).await.unwrap();

        let seat = client.reserve(&session, &trains[0]).await.unwrap();
        assert_eq!(seat.reservation_id, "PNR-0001");
        assert_eq!(seat.detail.as_deref(), Some("general"));

        let err = client.reserve(&session, &trains[1]).await.unwrap_err();
        assert!(matches!(err, BookingError::SoldOut));
    }

    #[tokio::test]
    async fn test_http_error_status_is_remote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.search_trains(&Session::new("k"), &query()).await.unwrap_err();
        assert!(matches!(err, BookingError::Remote { ref code, .. } if code == "503"));
    }
}
