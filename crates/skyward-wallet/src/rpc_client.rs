use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;

use skyward_core::types::AddressBundle;
use skyward_rpc::{
    AccessData, AccessRequest, BlindSignatureData, BlindSignatureRequest, BookingCodeRequest,
    BookingData, CanBeUsedForRecoveryRequest, CodeData, EmptyData, Envelope, LastAdrBundleRequest,
    LastAdrData, ParticipateData, ParticipateRequest, RecoveryStatusData, RecoveryTestData,
    RecoveryTestRequest, RegisterData, SendBookingRequest, SetAddressData, SetAddressRequest,
};
use skyward_state::{StatisticSummary, SystemInfo};

/// JSON-RPC 2.0 client for the Skyward wire protocol.
///
/// Raw HTTP POST with serde_json rather than a full jsonrpsee client, to
/// keep the wallet lean.
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
}

impl RpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Call a method and unwrap both the JSON-RPC layer and the `{data, err}`
    /// envelope. A non-empty `err` becomes an error here.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<T> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to server at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;
        if let Some(err) = json.get("error") {
            bail!("RPC error from {method}: {err}");
        }

        let envelope: Envelope<T> =
            serde_json::from_value(json["result"].clone()).context("parsing response envelope")?;
        if !envelope.err.is_empty() {
            bail!("{method}: {}", envelope.err);
        }
        Ok(envelope.data)
    }

    async fn call_with<R: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        req: &R,
    ) -> anyhow::Result<T> {
        self.call(method, serde_json::json!([req])).await
    }

    // ── System ───────────────────────────────────────────────────────────────

    pub async fn system_info(&self) -> anyhow::Result<SystemInfo> {
        self.call("system/info", serde_json::json!([])).await
    }

    pub async fn register(&self) -> anyhow::Result<u32> {
        let data: RegisterData = self.call("system/register", serde_json::json!([])).await?;
        Ok(data.client_id)
    }

    pub async fn reset(&self) -> anyhow::Result<()> {
        let _: EmptyData = self.call("system/reset", serde_json::json!([])).await?;
        Ok(())
    }

    pub async fn statistic(&self) -> anyhow::Result<StatisticSummary> {
        self.call("system/statistic", serde_json::json!([])).await
    }

    // ── Booking side ─────────────────────────────────────────────────────────

    pub async fn send_booking(
        &self,
        customer_id: u32,
        flight_id: u32,
        tier_id: &str,
    ) -> anyhow::Result<String> {
        let data: BookingData = self
            .call_with(
                "booking/send",
                &SendBookingRequest {
                    customer_id,
                    flight_id,
                    tier_id: tier_id.to_string(),
                },
            )
            .await?;
        Ok(data.token)
    }

    pub async fn get_blind_signature(
        &self,
        tier_id: &str,
        token: &str,
        blinded: &[u8],
        action: u8,
    ) -> anyhow::Result<String> {
        let data: BlindSignatureData = self
            .call_with(
                "blindSignature",
                &BlindSignatureRequest {
                    tier_id: tier_id.to_string(),
                    token: token.to_string(),
                    blind_token: hex::encode(blinded),
                    action,
                },
            )
            .await?;
        Ok(data.blind_signature)
    }

    pub async fn get_booking_code(
        &self,
        tier_id: &str,
        hash: &[u8],
        sig: &[u8],
    ) -> anyhow::Result<String> {
        let data: CodeData = self
            .call_with(
                "booking/code",
                &BookingCodeRequest {
                    tier_id: tier_id.to_string(),
                    hash_value: hex::encode(hash),
                    signature: hex::encode(sig),
                },
            )
            .await?;
        Ok(data.code)
    }

    // ── Claim side ───────────────────────────────────────────────────────────

    pub async fn access_bonus_system(
        &self,
        codes: &[String],
        bundle: &AddressBundle,
    ) -> anyhow::Result<AccessData> {
        self.call_with(
            "accessBonusSystem",
            &AccessRequest {
                codes: codes.to_vec(),
                adr_bundle: bundle.clone(),
            },
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set_address(
        &self,
        tier_id: &str,
        hash: &[u8],
        sig: &[u8],
        bundle: &AddressBundle,
        action: u8,
        pkr: &str,
    ) -> anyhow::Result<SetAddressData> {
        self.call_with(
            "setAddress",
            &SetAddressRequest {
                tier_id: tier_id.to_string(),
                hash_value: hex::encode(hash),
                signature: hex::encode(sig),
                adr_bundle: bundle.clone(),
                action,
                pkr: pkr.to_string(),
            },
        )
        .await
    }

    pub async fn participate(
        &self,
        tier_id: &str,
        hash: &[u8],
        sig: &[u8],
        pkr: &str,
    ) -> anyhow::Result<ParticipateData> {
        self.call_with(
            "participate",
            &ParticipateRequest {
                tier_id: tier_id.to_string(),
                hash_value: hex::encode(hash),
                signature: hex::encode(sig),
                pkr: pkr.to_string(),
            },
        )
        .await
    }

    // ── Recovery ─────────────────────────────────────────────────────────────

    /// Classification never fails transport-wise on a Failure status: the
    /// server reports status 4 plus the reason in `err`, which this client
    /// folds into the status value.
    pub async fn can_be_used_for_recovery(
        &self,
        tier_id: &str,
        bundle: &AddressBundle,
    ) -> anyhow::Result<RecoveryStatusData> {
        match self
            .call_with::<_, RecoveryStatusData>(
                "recovery/canBeUsedForRecovery",
                &CanBeUsedForRecoveryRequest {
                    tier_id: tier_id.to_string(),
                    adr_bundle: bundle.clone(),
                },
            )
            .await
        {
            Ok(data) => Ok(data),
            Err(_) => Ok(RecoveryStatusData::default()),
        }
    }

    pub async fn recovery_test(
        &self,
        tier_id: &str,
        recovery_token: &str,
        pkr: &str,
        bundle: &AddressBundle,
    ) -> anyhow::Result<RecoveryTestData> {
        self.call_with(
            "recovery/test",
            &RecoveryTestRequest {
                tier_id: tier_id.to_string(),
                recovery_token: recovery_token.to_string(),
                pkr: pkr.to_string(),
                adr_bundle: bundle.clone(),
            },
        )
        .await
    }

    /// `None` when the server has no chain for the seed on this tier.
    pub async fn last_adr_bundle(
        &self,
        seed_hex: &str,
        tier_id: &str,
    ) -> anyhow::Result<Option<LastAdrData>> {
        match self
            .call_with::<_, LastAdrData>(
                "recovery/lastAdrBdl",
                &LastAdrBundleRequest {
                    seed: seed_hex.to_string(),
                    tier_id: tier_id.to_string(),
                },
            )
            .await
        {
            Ok(data) => Ok(Some(data)),
            Err(_) => Ok(None),
        }
    }
}
