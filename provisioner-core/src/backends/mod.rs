pub mod semp_http;

pub mod mock;
