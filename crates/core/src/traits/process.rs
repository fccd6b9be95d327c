/// 进程级终止，所有客户端失联时由超时扫描器调用
pub trait ProcessTerminator: Send + Sync {
    fn terminate(&self, exit_status: i32, reason: &str);
}
