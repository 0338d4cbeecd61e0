// Git publishing: command worker and the daily digest commit publisher.

pub mod publish;
pub mod worker;
