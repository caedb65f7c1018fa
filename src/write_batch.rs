/// Ordered buffer of put/delete operations shared by every batch implementation.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    operations: Vec<BatchOperation>,
    size_bytes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } => key,
            BatchOperation::Delete { key } => key,
        }
    }

    fn size_bytes(&self) -> usize {
        match self {
            BatchOperation::Put { key, value } => key.len() + value.len(),
            BatchOperation::Delete { key } => key.len(),
        }
    }
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.push(BatchOperation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.push(BatchOperation::Delete { key: key.to_vec() });
    }

    pub fn push(&mut self, op: BatchOperation) {
        self.size_bytes += op.size_bytes();
        self.operations.push(op);
    }

    pub fn clear(&mut self) {
        self.operations.clear();
        self.size_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Key and value bytes recorded so far.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_batch_basic() {
        let mut batch = WriteBatch::new();

        batch.put(b"key1", b"value1");
        batch.put(b"key2", b"value2");
        batch.delete(b"key3");

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.size_bytes(), 4 + 6 + 4 + 6 + 4);

        let ops = batch.operations();
        match &ops[0] {
            BatchOperation::Put { key, value } => {
                assert_eq!(key, b"key1");
                assert_eq!(value, b"value1");
            }
            _ => panic!("Expected Put operation"),
        }

        match &ops[2] {
            BatchOperation::Delete { key } => {
                assert_eq!(key, b"key3");
            }
            _ => panic!("Expected Delete operation"),
        }
    }

    #[test]
    fn test_write_batch_clear() {
        let mut batch = WriteBatch::new();
        batch.put(b"key1", b"value1");
        batch.clear();

        assert!(batch.is_empty());
        assert_eq!(batch.size_bytes(), 0);
    }

    #[test]
    fn test_operation_key() {
        let put = BatchOperation::Put {
            key: b"a".to_vec(),
            value: b"1".to_vec(),
        };
        let del = BatchOperation::Delete { key: b"b".to_vec() };
        assert_eq!(put.key(), b"a");
        assert_eq!(del.key(), b"b");
    }
}
