use mockall::mock;
use settlement_engine::traits::{
    CaptureStatus,
    DeliveryHandle,
    DeliveryProvider,
    DeliveryQuote,
    DeliveryRequest,
    ExternalServiceError,
    PaymentProcessor,
    ProcessorRefund,
    RefundRequest,
};

mock! {
    pub PaymentGateway {}
    impl Clone for PaymentGateway {
        fn clone(&self) -> Self;
    }
    impl PaymentProcessor for PaymentGateway {
        async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, ExternalServiceError>;
        async fn fetch_payment_status(&self, payment_intent_id: &str) -> Result<CaptureStatus, ExternalServiceError>;
    }
}

mock! {
    pub Courier {}
    impl Clone for Courier {
        fn clone(&self) -> Self;
    }
    impl DeliveryProvider for Courier {
        async fn quote(&self, request: &DeliveryRequest) -> Result<DeliveryQuote, ExternalServiceError>;
        async fn accept(&self, quote: &DeliveryQuote, request: &DeliveryRequest) -> Result<DeliveryHandle, ExternalServiceError>;
        async fn delivery_status(&self, delivery_id: &str) -> Result<DeliveryHandle, ExternalServiceError>;
    }
}
