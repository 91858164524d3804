use ferry_observability::Counter;

pub struct WriterMetrics {
    pub documents: Counter<u64>,
    pub dirty_records: Counter<u64>,
    pub bulk_requests: Counter<u64>,
    pub bulk_retries: Counter<u64>,
}

impl Default for WriterMetrics {
    fn default() -> Self {
        let meter = ferry_observability::meter("writer");
        Self {
            documents: meter
                .u64_counter("writer.documents")
                .with_unit("{document}")
                .with_description("bulk operations acknowledged by the store")
                .build(),
            dirty_records: meter
                .u64_counter("writer.dirty_records")
                .with_unit("{record}")
                .with_description("records dropped because they could not become documents")
                .build(),
            bulk_requests: meter
                .u64_counter("writer.bulk.requests")
                .with_unit("{request}")
                .with_description("bulk requests sent to the store")
                .build(),
            bulk_retries: meter
                .u64_counter("writer.bulk.retries")
                .with_unit("{request}")
                .with_description("bulk requests sent again after a transport failure")
                .build(),
        }
    }
}
