mod fallback;
mod retransmit;
