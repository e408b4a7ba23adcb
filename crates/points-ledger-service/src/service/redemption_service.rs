//! 积分兑换服务
//!
//! 处理积分兑换话费/流量：
//! - 报价：面值 × 商品汇率，不产生任何写入
//! - 兑换：校验收货手机号 -> 报价 -> 扣减积分并提交事务 -> 提交履约
//!
//! ## 履约失败
//!
//! 扣减提交后账本的职责结束。履约提交失败时不会自动回滚扣减，
//! 只记录错误日志和指标，由运营人工核实后调用兑换退还接口补偿。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use engage_shared::config::RedemptionConfig;
use engage_shared::observability::metrics;
use tracing::{error, info, instrument};

use super::dto::{PointsChange, RedeemRequest};
use super::ledger_service::debit_in_tx;
use super::observe;
use crate::error::{LedgerError, Result};
use crate::models::{
    Carrier, EntryMetadata, FulfillmentOrder, FulfillmentStatus, LedgerEntry, ProductType,
    RedemptionQuote, RedemptionResult, ReferenceType, TransactionType,
    generate_fulfillment_reference, is_valid_phone, mask_phone,
};
use crate::repository::PointsStore;

/// 履约网关
///
/// 将已扣减的兑换订单提交给外部履约服务
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FulfillmentGateway: Send + Sync {
    async fn submit(&self, order: &FulfillmentOrder) -> Result<FulfillmentStatus>;
}

/// HTTP 履约网关
pub struct HttpFulfillmentGateway {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpFulfillmentGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Internal(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl FulfillmentGateway for HttpFulfillmentGateway {
    async fn submit(&self, order: &FulfillmentOrder) -> Result<FulfillmentStatus> {
        self.http_client
            .post(&self.endpoint)
            .json(order)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| LedgerError::Fulfillment(e.to_string()))?;

        Ok(FulfillmentStatus::Submitted)
    }
}

/// 队列履约网关
///
/// 未配置履约服务地址时使用。兑换流水（reference_type = redemption）即待履约队列，
/// 由外部履约服务按单号拉取
#[derive(Default)]
pub struct QueuedFulfillmentGateway;

#[async_trait]
impl FulfillmentGateway for QueuedFulfillmentGateway {
    async fn submit(&self, order: &FulfillmentOrder) -> Result<FulfillmentStatus> {
        info!(
            reference = %order.reference,
            ledger_entry_id = order.ledger_entry_id,
            carrier = order.carrier.as_str(),
            "Redemption queued for fulfillment"
        );
        Ok(FulfillmentStatus::Queued)
    }
}

/// 积分兑换服务
pub struct RedemptionService {
    store: Arc<dyn PointsStore>,
    gateway: Arc<dyn FulfillmentGateway>,
    config: RedemptionConfig,
}

impl RedemptionService {
    pub fn new(
        store: Arc<dyn PointsStore>,
        gateway: Arc<dyn FulfillmentGateway>,
        config: RedemptionConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// 兑换报价
    pub fn quote(
        &self,
        product_type: ProductType,
        carrier: Carrier,
        value: i64,
    ) -> Result<RedemptionQuote> {
        if value <= 0 {
            return Err(LedgerError::InvalidAmount(value));
        }
        if value < self.config.min_value || value > self.config.max_value {
            return Err(LedgerError::Validation(format!(
                "面值须在 {} 到 {} 之间",
                self.config.min_value, self.config.max_value
            )));
        }

        let rate = match product_type {
            ProductType::Airtime => self.config.airtime_points_per_unit,
            ProductType::Data => self.config.data_points_per_unit,
        };
        let points_needed = value
            .checked_mul(rate)
            .ok_or_else(|| LedgerError::Validation("兑换积分超出上限".to_string()))?;

        Ok(RedemptionQuote {
            product_type,
            carrier,
            value,
            rate,
            points_needed,
        })
    }

    /// 兑换
    ///
    /// 扣减提交后才调用履约网关；履约失败返回 `FulfillmentStatus::Failed`，扣减保持生效
    #[instrument(
        skip(self, request),
        fields(member_id = %request.member_id, product_type = request.product_type.as_str(), value = request.value)
    )]
    pub async fn redeem(&self, request: RedeemRequest) -> Result<RedemptionResult> {
        let start = Instant::now();
        let debited = self.debit_for_redemption(&request).await;
        observe("redeem", &debited, start);

        let (quote, entry, reference) = match debited {
            Ok(debited) => debited,
            Err(e) => {
                metrics::record_redemption(request.product_type.as_str(), e.error_code());
                return Err(e);
            }
        };
        metrics::record_points_debited(entry.transaction_type.as_str(), entry.amount);

        let order = FulfillmentOrder {
            reference: reference.clone(),
            member_id: request.member_id,
            ledger_entry_id: entry.id,
            product_type: request.product_type,
            carrier: request.carrier,
            value: request.value,
            recipient_phone: request.recipient_phone.clone(),
        };

        let (fulfillment, fulfillment_error) = match self.gateway.submit(&order).await {
            Ok(status) => {
                info!(
                    reference = %reference,
                    entry_id = entry.id,
                    points = quote.points_needed,
                    fulfillment = ?status,
                    "Redemption debited"
                );
                (status, None)
            }
            Err(e) => {
                error!(
                    reference = %reference,
                    entry_id = entry.id,
                    member_id = %request.member_id,
                    points = quote.points_needed,
                    error = %e,
                    "Fulfillment failed after debit committed; debit is NOT reversed. \
                     Runbook: confirm with the carrier that nothing was delivered, then \
                     POST /api/v1/admin/points/refunds with originalEntryId = entry_id"
                );
                metrics::record_fulfillment_failure(request.carrier.as_str());
                (FulfillmentStatus::Failed, Some(e.to_string()))
            }
        };

        let status = match fulfillment {
            FulfillmentStatus::Failed => "fulfillment_failed",
            _ => "success",
        };
        metrics::record_redemption(request.product_type.as_str(), status);

        Ok(RedemptionResult {
            fulfillment_reference: reference,
            quote,
            entry,
            fulfillment,
            fulfillment_error,
        })
    }

    async fn debit_for_redemption(
        &self,
        request: &RedeemRequest,
    ) -> Result<(RedemptionQuote, LedgerEntry, String)> {
        if !is_valid_phone(&request.recipient_phone) {
            return Err(LedgerError::Validation(
                "收货手机号格式不正确".to_string(),
            ));
        }

        let quote = self.quote(request.product_type, request.carrier, request.value)?;
        let reference = generate_fulfillment_reference();

        let change = PointsChange::new(
            request.member_id,
            quote.points_needed,
            TransactionType::Redeem,
            "redemption",
        )
        .with_reference(ReferenceType::Redemption, reference.clone())
        .with_metadata(EntryMetadata::Redemption {
            fulfillment_reference: reference.clone(),
            product_type: request.product_type,
            carrier: request.carrier,
            value: request.value,
            recipient: mask_phone(&request.recipient_phone),
        });

        let mut tx = self.store.begin().await?;
        let entry = debit_in_tx(tx.as_mut(), &change).await?;
        tx.commit().await?;

        Ok((quote, entry, reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryPointsStore;
    use crate::service::LedgerService;
    use engage_shared::config::PointsConfig;
    use uuid::Uuid;

    async fn setup(gateway: Arc<dyn FulfillmentGateway>) -> (RedemptionService, LedgerService, Uuid) {
        let store = MemoryPointsStore::new();
        let member = Uuid::now_v7();
        store.register_member(member).await;
        let store: Arc<dyn PointsStore> = Arc::new(store);

        let ledger = LedgerService::new(store.clone(), PointsConfig::default());
        ledger
            .add_points(PointsChange::new(
                member,
                1_000,
                TransactionType::Earn,
                "event_attendance",
            ))
            .await
            .unwrap();

        let service = RedemptionService::new(store, gateway, RedemptionConfig::default());
        (service, ledger, member)
    }

    fn redeem_request(member_id: Uuid, value: i64) -> RedeemRequest {
        RedeemRequest {
            member_id,
            product_type: ProductType::Airtime,
            carrier: Carrier::Mtn,
            value,
            recipient_phone: "08031234567".to_string(),
        }
    }

    #[tokio::test]
    async fn test_quote() {
        let (service, _, _) = setup(Arc::new(QueuedFulfillmentGateway)).await;

        let quote = service.quote(ProductType::Airtime, Carrier::Glo, 100).unwrap();
        assert_eq!(quote.rate, 10);
        assert_eq!(quote.points_needed, 1_000);

        let quote = service.quote(ProductType::Data, Carrier::NineMobile, 100).unwrap();
        assert_eq!(quote.points_needed, 1_200);

        assert!(matches!(
            service.quote(ProductType::Data, Carrier::Mtn, 0),
            Err(LedgerError::InvalidAmount(0))
        ));
        assert!(matches!(
            service.quote(ProductType::Data, Carrier::Mtn, 10),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            service.quote(ProductType::Data, Carrier::Mtn, 50_000),
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_redeem_submits_to_gateway() {
        let mut gateway = MockFulfillmentGateway::new();
        gateway
            .expect_submit()
            .withf(|order| order.value == 50 && order.recipient_phone == "08031234567")
            .times(1)
            .returning(|_| Ok(FulfillmentStatus::Submitted));

        let (service, ledger, member) = setup(Arc::new(gateway)).await;
        let result = service.redeem(redeem_request(member, 50)).await.unwrap();

        assert_eq!(result.fulfillment, FulfillmentStatus::Submitted);
        assert!(result.fulfillment_error.is_none());
        assert_eq!(result.entry.amount, -500);
        assert_eq!(result.entry.transaction_type, TransactionType::Redeem);
        assert_eq!(result.entry.reference_type, Some(ReferenceType::Redemption));
        assert_eq!(
            result.entry.reference_id.as_deref(),
            Some(result.fulfillment_reference.as_str())
        );
        match &result.entry.metadata {
            EntryMetadata::Redemption { recipient, .. } => assert_eq!(recipient, "0803****567"),
            other => panic!("unexpected metadata: {:?}", other),
        }
        assert_eq!(ledger.get_balance(member).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_fulfillment_failure_keeps_debit() {
        let mut gateway = MockFulfillmentGateway::new();
        gateway
            .expect_submit()
            .times(1)
            .returning(|_| Err(LedgerError::Fulfillment("carrier timeout".to_string())));

        let (service, ledger, member) = setup(Arc::new(gateway)).await;
        let result = service.redeem(redeem_request(member, 50)).await.unwrap();

        assert_eq!(result.fulfillment, FulfillmentStatus::Failed);
        assert!(result.fulfillment_error.unwrap().contains("carrier timeout"));
        assert_eq!(ledger.get_balance(member).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_redeem_rejected_before_gateway() {
        let mut gateway = MockFulfillmentGateway::new();
        gateway.expect_submit().never();

        let (service, ledger, member) = setup(Arc::new(gateway)).await;

        let mut bad_phone = redeem_request(member, 50);
        bad_phone.recipient_phone = "12345".to_string();
        assert!(matches!(
            service.redeem(bad_phone).await,
            Err(LedgerError::Validation(_))
        ));

        let err = service.redeem(redeem_request(member, 200)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                required: 2_000,
                available: 1_000
            }
        ));
        assert_eq!(ledger.get_balance(member).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn test_queued_gateway() {
        let gateway = QueuedFulfillmentGateway;
        let order = FulfillmentOrder {
            reference: generate_fulfillment_reference(),
            member_id: Uuid::now_v7(),
            ledger_entry_id: 1,
            product_type: ProductType::Data,
            carrier: Carrier::Airtel,
            value: 100,
            recipient_phone: "08031234567".to_string(),
        };
        assert_eq!(gateway.submit(&order).await.unwrap(), FulfillmentStatus::Queued);
    }

    #[test]
    fn test_http_gateway_builds() {
        assert!(HttpFulfillmentGateway::new("http://localhost:9/orders", Duration::from_secs(1)).is_ok());
    }
}
