use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use skyward_state::{DebugSnapshot, StatisticSummary, SystemInfo};

use crate::types::{
    AccessData, AccessRequest, BlindSignatureData, BlindSignatureRequest, BookingCodeRequest,
    BookingData, CanBeUsedForRecoveryRequest, CodeData, EmptyData, Envelope, LastAdrBundleRequest,
    LastAdrData, ParticipateData, ParticipateRequest, RecoveryStatusData, RecoveryTestData,
    RecoveryTestRequest, RegisterData, SendBookingRequest, SetAddressData, SetAddressRequest,
};

/// The Skyward wire protocol: one JSON-RPC method per endpoint, named after
/// the endpoint path. Application failures never surface as JSON-RPC errors;
/// they ride in the `{data, err}` envelope.
#[rpc(server)]
pub trait SkywardApi {
    /// Flights on offer and public tier descriptions (per-action keys included).
    #[method(name = "system/info")]
    async fn system_info(&self) -> RpcResult<Envelope<SystemInfo>>;

    /// Allocate the next client id (monotonic from 0).
    #[method(name = "system/register")]
    async fn register(&self) -> RpcResult<Envelope<RegisterData>>;

    /// Clear all mutable server state.
    #[method(name = "system/reset")]
    async fn reset(&self) -> RpcResult<Envelope<EmptyData>>;

    /// Full dump of the mutable state for offline inspection.
    #[method(name = "system/debug")]
    async fn debug(&self) -> RpcResult<Envelope<DebugSnapshot>>;

    /// Per-tier-action map statistics plus endpoint call counters.
    #[method(name = "system/statistic")]
    async fn statistic(&self) -> RpcResult<Envelope<StatisticSummary>>;

    /// Acknowledge and shut the server down.
    #[method(name = "system/exit")]
    async fn exit(&self) -> RpcResult<Envelope<EmptyData>>;

    /// Book a flight at a tier; returns a one-shot booking token.
    #[method(name = "booking/send")]
    async fn send_booking(&self, req: SendBookingRequest) -> RpcResult<Envelope<BookingData>>;

    /// Exchange an unblinded booking signature for a bonus code.
    #[method(name = "booking/code")]
    async fn booking_code(&self, req: BookingCodeRequest) -> RpcResult<Envelope<CodeData>>;

    /// Sign a blinded value, consuming the presented token.
    #[method(name = "blindSignature")]
    async fn blind_signature(
        &self,
        req: BlindSignatureRequest,
    ) -> RpcResult<Envelope<BlindSignatureData>>;

    /// Spend codes to unlock tiers and anchor a pseudonymous chain.
    #[method(name = "accessBonusSystem")]
    async fn access_bonus_system(&self, req: AccessRequest) -> RpcResult<Envelope<AccessData>>;

    /// Rotate a chain to a fresh address.
    #[method(name = "setAddress")]
    async fn set_address(&self, req: SetAddressRequest) -> RpcResult<Envelope<SetAddressData>>;

    /// Draw a reward payload against an unlocked tier.
    #[method(name = "participate")]
    async fn participate(&self, req: ParticipateRequest) -> RpcResult<Envelope<ParticipateData>>;

    /// Classify where on its chain a presented bundle sits.
    #[method(name = "recovery/canBeUsedForRecovery")]
    async fn can_be_used_for_recovery(
        &self,
        req: CanBeUsedForRecoveryRequest,
    ) -> RpcResult<Envelope<RecoveryStatusData>>;

    /// Prove chain continuity and recover the stored tokens.
    #[method(name = "recovery/test")]
    async fn recovery_test(
        &self,
        req: RecoveryTestRequest,
    ) -> RpcResult<Envelope<RecoveryTestData>>;

    /// Last chain endpoint recorded for a seed; the scan start of a
    /// reconstructing client.
    #[method(name = "recovery/lastAdrBdl")]
    async fn last_adr_bundle(
        &self,
        req: LastAdrBundleRequest,
    ) -> RpcResult<Envelope<LastAdrData>>;
}
