use nom::bytes::complete::take;
use nom::IResult;

pub fn be_u24(input: &[u8]) -> IResult<&[u8], u32> {
    let (input, b) = take(3usize)(input)?;
    Ok((input, u32::from_be_bytes([0, b[0], b[1], b[2]])))
}

pub fn be_u48(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, b) = take(6usize)(input)?;
    Ok((
        input,
        u64::from_be_bytes([0, 0, b[0], b[1], b[2], b[3], b[4], b[5]]),
    ))
}
