use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use skyward_core::error::SkywardError;
use skyward_core::types::Action;
use skyward_recovery::{can_be_used_for_recovery, recovery_test};
use skyward_state::{DebugSnapshot, StatisticSummary, SystemInfo};

use crate::api::SkywardApiServer;
use crate::types::{
    AccessData, AccessRequest, BlindSignatureData, BlindSignatureRequest, BookingCodeRequest,
    BookingData, CanBeUsedForRecoveryRequest, CodeData, EmptyData, Envelope, LastAdrBundleRequest,
    LastAdrData, ParticipateData, ParticipateRequest, RecoveryStatusData, RecoveryTestData,
    RecoveryTestRequest, RegisterData, SendBookingRequest, SetAddressData, SetAddressRequest,
};

/// Shared state behind the RPC surface.
pub struct RpcServerState {
    pub server: skyward_state::Server,
    /// Where `system/debug` additionally writes its dump, when configured.
    pub result_dir: Option<PathBuf>,
    /// Signals `system/exit` to the hosting binary.
    pub shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Fold an operation result into the wire envelope, logging rejections with
/// their taxonomy kind.
fn respond<T: Default>(endpoint: &str, result: Result<T, SkywardError>) -> Envelope<T> {
    match result {
        Ok(data) => Envelope::ok(data),
        Err(e) => {
            warn!(endpoint, kind = %e.kind(), error = %e, "request rejected");
            Envelope::fail(&e)
        }
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, SkywardError> {
    hex::decode(value).map_err(|_| SkywardError::InvalidField(field.to_string()))
}

// ── RPC implementation ───────────────────────────────────────────────────────

#[async_trait]
impl SkywardApiServer for RpcServer {
    async fn system_info(&self) -> RpcResult<Envelope<SystemInfo>> {
        self.state.server.counters().system_info += 1;
        Ok(Envelope::ok(self.state.server.system_info()))
    }

    async fn register(&self) -> RpcResult<Envelope<RegisterData>> {
        self.state.server.counters().register += 1;
        let client_id = self.state.server.register();
        info!(client_id, "client registered");
        Ok(Envelope::ok(RegisterData { client_id }))
    }

    async fn reset(&self) -> RpcResult<Envelope<EmptyData>> {
        self.state.server.counters().reset += 1;
        self.state.server.reset();
        Ok(Envelope::ok(EmptyData {}))
    }

    async fn debug(&self) -> RpcResult<Envelope<DebugSnapshot>> {
        self.state.server.counters().debug += 1;
        let snapshot = self.state.server.debug_snapshot();

        if let Some(dir) = &self.state.result_dir {
            let stamp = chrono::Utc::now().format("%Y_%m_%d_%H_%M_%S");
            let path = dir.join(format!("{stamp}_server_debug.json"));
            match serde_json::to_vec_pretty(&snapshot) {
                Ok(bytes) => {
                    if let Err(e) = std::fs::write(&path, bytes) {
                        warn!(path = %path.display(), error = %e, "debug dump not written");
                    }
                }
                Err(e) => warn!(error = %e, "debug dump serialization failed"),
            }
        }

        Ok(Envelope::ok(snapshot))
    }

    async fn statistic(&self) -> RpcResult<Envelope<StatisticSummary>> {
        self.state.server.counters().statistic += 1;
        Ok(Envelope::ok(self.state.server.statistics()))
    }

    async fn exit(&self) -> RpcResult<Envelope<EmptyData>> {
        self.state.server.counters().exit += 1;
        info!("exit requested over the wire");
        let _ = self.state.shutdown_tx.send(()).await;
        Ok(Envelope::ok(EmptyData {}))
    }

    async fn send_booking(&self, req: SendBookingRequest) -> RpcResult<Envelope<BookingData>> {
        self.state.server.counters().send_booking += 1;
        let result = self
            .state
            .server
            .booking(req.customer_id, req.flight_id, &req.tier_id)
            .map(|token| BookingData { token });
        Ok(respond("booking/send", result))
    }

    async fn booking_code(&self, req: BookingCodeRequest) -> RpcResult<Envelope<CodeData>> {
        self.state.server.counters().get_booking_code += 1;
        let result = (|| {
            let hash = decode_hex("hashValue", &req.hash_value)?;
            let sig = decode_hex("signature", &req.signature)?;
            self.state
                .server
                .get_booking_code(&req.tier_id, &hash, &sig)
                .map(|code| CodeData { code })
        })();
        Ok(respond("booking/code", result))
    }

    async fn blind_signature(
        &self,
        req: BlindSignatureRequest,
    ) -> RpcResult<Envelope<BlindSignatureData>> {
        self.state.server.counters().blind_signature += 1;
        let result = (|| {
            let action = Action::from_wire(req.action)?;
            let blinded = decode_hex("blindToken", &req.blind_token)?;
            self.state
                .server
                .get_blind_signature(&req.tier_id, &req.token, &blinded, action)
                .map(|blind_signature| BlindSignatureData { blind_signature })
        })();
        Ok(respond("blindSignature", result))
    }

    async fn access_bonus_system(&self, req: AccessRequest) -> RpcResult<Envelope<AccessData>> {
        self.state.server.counters().access_bonus_system += 1;
        let result = self
            .state
            .server
            .access_bonus_system(&req.codes, &req.adr_bundle)
            .map(|(tokens, recovery_tokens)| AccessData {
                tokens,
                recovery_tokens,
            });
        Ok(respond("accessBonusSystem", result))
    }

    async fn set_address(&self, req: SetAddressRequest) -> RpcResult<Envelope<SetAddressData>> {
        self.state.server.counters().set_address += 1;
        let result = (|| {
            let action = Action::from_wire(req.action)?;
            let hash = decode_hex("hashValue", &req.hash_value)?;
            let sig = decode_hex("signature", &req.signature)?;
            self.state
                .server
                .set_address(&req.tier_id, &hash, &sig, &req.adr_bundle, action, &req.pkr)
                .map(|(token, recovery_token)| SetAddressData {
                    token,
                    recovery_token,
                })
        })();
        Ok(respond("setAddress", result))
    }

    async fn participate(&self, req: ParticipateRequest) -> RpcResult<Envelope<ParticipateData>> {
        self.state.server.counters().participate += 1;
        let result = (|| {
            let hash = decode_hex("hashValue", &req.hash_value)?;
            let sig = decode_hex("signature", &req.signature)?;
            self.state
                .server
                .participate(&req.tier_id, &hash, &sig, &req.pkr)
                .map(|(token, recovery_token, bonus_data)| ParticipateData {
                    token,
                    recovery_token,
                    bonus_data,
                })
        })();
        Ok(respond("participate", result))
    }

    async fn can_be_used_for_recovery(
        &self,
        req: CanBeUsedForRecoveryRequest,
    ) -> RpcResult<Envelope<RecoveryStatusData>> {
        self.state.server.counters().can_be_used_for_recovery += 1;
        let result = can_be_used_for_recovery(&self.state.server, &req.tier_id, &req.adr_bundle)
            .map(|(status, token)| RecoveryStatusData {
                recovery_status: status.wire(),
                token,
            });
        // A Failure classification still reports status 4 in `data`.
        Ok(respond("recovery/canBeUsedForRecovery", result))
    }

    async fn recovery_test(
        &self,
        req: RecoveryTestRequest,
    ) -> RpcResult<Envelope<RecoveryTestData>> {
        self.state.server.counters().recovery_test += 1;
        let result = recovery_test(
            &self.state.server,
            &req.tier_id,
            &req.recovery_token,
            &req.pkr,
            &req.adr_bundle,
        )
        .map(|(token, found_recovery_token, bonus_data)| RecoveryTestData {
            token,
            found_recovery_token,
            bonus_data,
        });
        Ok(respond("recovery/test", result))
    }

    async fn last_adr_bundle(
        &self,
        req: LastAdrBundleRequest,
    ) -> RpcResult<Envelope<LastAdrData>> {
        self.state.server.counters().last_adr_bundle += 1;
        let result = (|| {
            // Normalize: seed-keyed maps use lowercase hex.
            let seed_hex = hex::encode(decode_hex("seed", &req.seed)?);
            self.state
                .server
                .last_address_bundle(&seed_hex, &req.tier_id)
                .map(|(address, account_id)| LastAdrData {
                    address,
                    account_id,
                })
        })();
        Ok(respond("recovery/lastAdrBdl", result))
    }
}
