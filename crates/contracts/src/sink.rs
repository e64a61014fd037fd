//! 算子输出的落地接口
//!
//! sink 按发出顺序收到算子输出通道上的每一条消息，数据与 watermark 都包括在内。

use crate::{ContractError, OperatorOutput};

#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// 日志与指标里使用的名字，在同一 dispatcher 内唯一
    fn name(&self) -> &str;

    async fn write(&mut self, output: &OperatorOutput) -> Result<(), ContractError>;

    async fn flush(&mut self) -> Result<(), ContractError>;

    /// worker 退出时在 flush 之后调用，之后不再 write
    async fn close(&mut self) -> Result<(), ContractError>;
}
