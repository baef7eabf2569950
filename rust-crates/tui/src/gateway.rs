use std::{
    collections::HashMap,
    fmt,
};

use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use haiku_core::{
    Address,
    LineSlot,
    RawDayHaiku,
};
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
};

/// Surface of the wallet-connector gateway.
///
/// Reads are plain contract views; writes go through the gateway's call
/// bundle endpoints (send, then poll status), which is also where fee
/// sponsorship gets attached. Signing and broadcasting happen on the other
/// side of this trait.
pub trait WalletGateway {
    fn todays_haiku(&self) -> impl Future<Output = Result<RawDayHaiku>> + Send;
    fn yesterdays_haiku(&self) -> impl Future<Output = Result<RawDayHaiku>> + Send;
    fn next_line_number(&self) -> impl Future<Output = Result<u8>> + Send;
    fn has_submitted_today(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<bool>> + Send;
    fn user_streak(&self, address: &Address)
    -> impl Future<Output = Result<u64>> + Send;
    fn day_winners(
        &self,
        day_id: u64,
    ) -> impl Future<Output = Result<Option<DayWinners>>> + Send;
    fn has_voted_on_day(
        &self,
        address: &Address,
        day_id: u64,
    ) -> impl Future<Output = Result<bool>> + Send;
    fn line_submitted_events(
        &self,
        cursor: u64,
    ) -> impl Future<Output = Result<EventPage>> + Send;
    fn capabilities(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<HashMap<u64, ChainCapabilities>>> + Send;
    fn send_calls(
        &self,
        request: SendCallsRequest,
    ) -> impl Future<Output = Result<String>> + Send;
    fn call_status(&self, id: &str) -> impl Future<Output = Result<CallStatus>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWinners {
    pub day_id: u64,
    pub winners: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSubmittedEvent {
    pub day_id: u64,
    pub line_number: u8,
    pub author: Address,
    pub text: String,
}

/// One page of the `LineSubmitted` log feed. `next_cursor` is passed back
/// on the next poll; an unchanged cursor means nothing new happened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventPage {
    pub events: Vec<LineSubmittedEvent>,
    pub next_cursor: u64,
}

/// What the wallet advertises per chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainCapabilities {
    pub paymaster_supported: bool,
}

/// A single contract call inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractCall {
    pub function: String,
    pub args: Vec<serde_json::Value>,
}

impl ContractCall {
    pub fn submit_line(slot: LineSlot, text: &str) -> Self {
        ContractCall {
            function: "submitLine".to_string(),
            args: vec![slot.line_number().into(), text.into()],
        }
    }

    pub fn vote_for_yesterday() -> Self {
        ContractCall {
            function: "voteForYesterday".to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCallsRequest {
    pub from: Address,
    pub chain_id: u64,
    pub calls: Vec<ContractCall>,
    /// Sponsorship endpoint to attach, when the chain supports one.
    pub paymaster_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    Pending,
    Confirmed,
    Failed { revert_reason: Option<String> },
}

/// HTTP implementation of [`WalletGateway`].
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Self {
        HttpGateway {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The sponsorship proxy lives at a fixed path on the gateway origin.
    pub fn paymaster_proxy_url(&self) -> String {
        format!("{}/api/paymaster", self.base_url)
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .wrap_err_with(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(eyre!("gateway returned {status} for {url}"));
        }
        response
            .json::<T>()
            .await
            .wrap_err_with(|| format!("decoding response from {url} failed"))
    }
}

impl fmt::Display for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gateway at {}", self.base_url)
    }
}

impl WalletGateway for HttpGateway {
    async fn todays_haiku(&self) -> Result<RawDayHaiku> {
        let dto: DayHaikuDto = self.get_json("/haiku/today").await?;
        Ok(dto.into())
    }

    async fn yesterdays_haiku(&self) -> Result<RawDayHaiku> {
        let dto: DayHaikuDto = self.get_json("/haiku/yesterday").await?;
        Ok(dto.into())
    }

    async fn next_line_number(&self) -> Result<u8> {
        let dto: NextLineDto = self.get_json("/haiku/next-line").await?;
        Ok(dto.line_number)
    }

    async fn has_submitted_today(&self, address: &Address) -> Result<bool> {
        let dto: SubmittedTodayDto = self
            .get_json(&format!("/users/{address}/submitted-today"))
            .await?;
        Ok(dto.submitted)
    }

    async fn user_streak(&self, address: &Address) -> Result<u64> {
        let dto: StreakDto = self.get_json(&format!("/users/{address}/streak")).await?;
        Ok(dto.streak)
    }

    async fn day_winners(&self, day_id: u64) -> Result<Option<DayWinners>> {
        let url = format!("{}/days/{day_id}/winners", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .wrap_err_with(|| format!("request to {url} failed"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(eyre!("gateway returned {status} for {url}"));
        }
        let dto: DayWinnersDto = response
            .json()
            .await
            .wrap_err_with(|| format!("decoding response from {url} failed"))?;
        if !dto.has_winners {
            return Ok(None);
        }
        Ok(Some(DayWinners {
            day_id,
            winners: dto
                .winners
                .iter()
                .filter_map(|w| w.parse::<Address>().ok())
                .filter(|w| !w.is_zero())
                .collect(),
        }))
    }

    async fn has_voted_on_day(&self, address: &Address, day_id: u64) -> Result<bool> {
        let dto: VotedDto = self
            .get_json(&format!("/users/{address}/voted/{day_id}"))
            .await?;
        Ok(dto.voted)
    }

    async fn line_submitted_events(&self, cursor: u64) -> Result<EventPage> {
        let dto: EventPageDto = self
            .get_json(&format!("/events/line-submitted?cursor={cursor}"))
            .await?;
        Ok(dto.into())
    }

    async fn capabilities(
        &self,
        address: &Address,
    ) -> Result<HashMap<u64, ChainCapabilities>> {
        let dto: HashMap<u64, CapabilitiesDto> = self
            .get_json(&format!("/wallet/{address}/capabilities"))
            .await?;
        Ok(dto
            .into_iter()
            .map(|(chain_id, caps)| (chain_id, caps.into()))
            .collect())
    }

    async fn send_calls(&self, request: SendCallsRequest) -> Result<String> {
        let url = format!("{}/wallet/calls", self.base_url);
        let body = SendCallsBodyDto::from(&request);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(eyre!("gateway returned {status} for {url}"));
        }
        let dto: SendCallsResponseDto = response
            .json()
            .await
            .wrap_err_with(|| format!("decoding response from {url} failed"))?;
        Ok(dto.id)
    }

    async fn call_status(&self, id: &str) -> Result<CallStatus> {
        let dto: CallStatusDto = self.get_json(&format!("/wallet/calls/{id}")).await?;
        CallStatus::try_from(dto)
    }
}

#[derive(Debug, Deserialize)]
struct DayHaikuDto {
    lines: [String; 3],
    authors: [String; 3],
    vote_count: u64,
    submitted_lines: u8,
    #[serde(default)]
    winner_declared: bool,
    #[serde(default)]
    is_winning: bool,
}

impl From<DayHaikuDto> for RawDayHaiku {
    fn from(dto: DayHaikuDto) -> Self {
        RawDayHaiku {
            lines: dto.lines,
            authors: dto.authors,
            vote_count: dto.vote_count,
            submitted_lines: dto.submitted_lines,
            winner_declared: dto.winner_declared,
            is_winning: dto.is_winning,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NextLineDto {
    line_number: u8,
}

#[derive(Debug, Deserialize)]
struct SubmittedTodayDto {
    submitted: bool,
}

#[derive(Debug, Deserialize)]
struct StreakDto {
    streak: u64,
}

#[derive(Debug, Deserialize)]
struct DayWinnersDto {
    winners: [String; 3],
    has_winners: bool,
}

#[derive(Debug, Deserialize)]
struct VotedDto {
    voted: bool,
}

#[derive(Debug, Deserialize)]
struct LineSubmittedEventDto {
    day_id: u64,
    line_number: u8,
    author: Address,
    text: String,
}

#[derive(Debug, Deserialize)]
struct EventPageDto {
    events: Vec<LineSubmittedEventDto>,
    next_cursor: u64,
}

impl From<EventPageDto> for EventPage {
    fn from(dto: EventPageDto) -> Self {
        EventPage {
            events: dto
                .events
                .into_iter()
                .map(|e| LineSubmittedEvent {
                    day_id: e.day_id,
                    line_number: e.line_number,
                    author: e.author,
                    text: e.text,
                })
                .collect(),
            next_cursor: dto.next_cursor,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CapabilitiesDto {
    #[serde(default)]
    paymaster_service: PaymasterServiceDto,
}

#[derive(Debug, Default, Deserialize)]
struct PaymasterServiceDto {
    #[serde(default)]
    supported: bool,
}

impl From<CapabilitiesDto> for ChainCapabilities {
    fn from(dto: CapabilitiesDto) -> Self {
        ChainCapabilities {
            paymaster_supported: dto.paymaster_service.supported,
        }
    }
}

#[derive(Debug, Serialize)]
struct SendCallsBodyDto {
    from: String,
    chain_id: u64,
    calls: Vec<ContractCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    capabilities: Option<SendCapabilitiesDto>,
}

#[derive(Debug, Serialize)]
struct SendCapabilitiesDto {
    paymaster_service: PaymasterUrlDto,
}

#[derive(Debug, Serialize)]
struct PaymasterUrlDto {
    url: String,
}

impl From<&SendCallsRequest> for SendCallsBodyDto {
    fn from(request: &SendCallsRequest) -> Self {
        SendCallsBodyDto {
            from: request.from.to_string(),
            chain_id: request.chain_id,
            calls: request.calls.clone(),
            capabilities: request.paymaster_url.clone().map(|url| {
                SendCapabilitiesDto {
                    paymaster_service: PaymasterUrlDto { url },
                }
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendCallsResponseDto {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CallStatusDto {
    status: String,
    #[serde(default)]
    revert_reason: Option<String>,
}

impl TryFrom<CallStatusDto> for CallStatus {
    type Error = color_eyre::eyre::Report;

    fn try_from(dto: CallStatusDto) -> Result<Self> {
        match dto.status.as_str() {
            "pending" => Ok(CallStatus::Pending),
            "confirmed" => Ok(CallStatus::Confirmed),
            "failed" => Ok(CallStatus::Failed {
                revert_reason: dto.revert_reason,
            }),
            other => Err(eyre!("unknown call status '{other}'")),
        }
    }
}
